//! Loop-Nest Transformer: the fixed pipeline of rewrites applied to every
//! compute tensor's statement tree between lowering and backend handoff.

mod fuse;
mod gpu_split;
mod inline;
mod parallelize;
mod prealloc;
mod simplify;
mod vectorize;

use crate::config::KernelConfig;
use crate::graph::Device;
use crate::ir::{ComputeTensor, ExprHandle, Stmt};

/// Result of running the full pipeline: the rewritten compute tensors plus
/// the side-channel set of buffers eligible for one-time static allocation.
pub struct TransformOutput {
    pub computes: Vec<ComputeTensor>,
    pub static_buffers: Vec<String>,
}

/// Runs simplify, inline, optimize-conditionals, horizontal fusion (CPU),
/// parallelize, flatten+split (CUDA), vectorize, pre-allocate, then a final
/// prepare-for-codegen and re-simplify pass, in that fixed order.
///
/// `optimize_conditionals` runs strictly before fusion: folding a `Cond`
/// into one branch can turn two compatible-bounds loops into fusion
/// candidates that a post-fusion conditional fold would miss, and running
/// it after fusion would require re-discovering fused loop identity.
pub fn run(
    computes: Vec<ComputeTensor>,
    output_names: &[String],
    device: Device,
    cfg: &KernelConfig,
    available_threads: usize,
) -> TransformOutput {
    let computes: Vec<ComputeTensor> = computes
        .into_iter()
        .map(|c| ComputeTensor {
            buf: c.buf,
            stmt: c.stmt.map(simplify::simplify_stmt),
        })
        .collect();

    let computes = inline::inline_single_use(computes, output_names);

    let computes: Vec<ComputeTensor> = computes
        .into_iter()
        .map(|c| {
            let stmt = c.stmt.map(|s| {
                let s = if cfg.optimize_conditionals { optimize_conditionals(s) } else { s };
                if device == Device::Cpu {
                    fuse::fuse_horizontal(s)
                } else {
                    s
                }
            });
            ComputeTensor { buf: c.buf, stmt }
        })
        .collect();

    let computes: Vec<ComputeTensor> = computes
        .into_iter()
        .map(|c| {
            let stmt = c.stmt.map(|s| match device {
                Device::Cpu => parallelize::parallelize(s, available_threads),
                Device::Gpu => {
                    let split = gpu_split::flatten_and_split(s, cfg);
                    vectorize::vectorize(split)
                }
            });
            ComputeTensor { buf: c.buf, stmt }
        })
        .collect();

    let computes: Vec<ComputeTensor> = if device == Device::Cpu {
        computes
            .into_iter()
            .map(|c| ComputeTensor { buf: c.buf, stmt: c.stmt.map(vectorize::vectorize) })
            .collect()
    } else {
        computes
    };

    let static_buffers = prealloc::static_buffer_names(&computes);

    // prepare-for-codegen: for the Block backend, the per-dtype block size
    // (32 lanes for Byte tensors, 16 otherwise) is attached by the backend
    // at dispatch time from each buffer's own dtype, not here.
    let computes: Vec<ComputeTensor> = computes
        .into_iter()
        .map(|c| ComputeTensor {
            buf: c.buf,
            stmt: c.stmt.map(simplify::simplify_stmt),
        })
        .collect();

    TransformOutput { computes, static_buffers }
}

/// Block backend per-dtype block size: 32 lanes for `Byte`-width data, 16
/// otherwise.
pub fn block_backend_block_size(dtype: crate::ir::Dtype) -> i64 {
    match dtype {
        crate::ir::Dtype::Bool => 32,
        _ => 16,
    }
}

fn optimize_conditionals(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Cond { cond, then_branch, else_branch } => {
            let cond = crate::ir::simplify_expr(&cond);
            if let Some(c) = as_const_bool(&cond) {
                let chosen = if c {
                    *then_branch
                } else {
                    else_branch.map(|b| *b).unwrap_or(Stmt::Block(vec![]))
                };
                return optimize_conditionals(chosen);
            }
            Stmt::Cond {
                cond,
                then_branch: Box::new(optimize_conditionals(*then_branch)),
                else_branch: else_branch.map(|b| Box::new(optimize_conditionals(*b))),
            }
        }
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => Stmt::For {
            var,
            start,
            stop,
            body: Box::new(optimize_conditionals(*body)),
            parallel,
            gpu_axis,
            vectorized,
        },
        Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(optimize_conditionals).collect()),
        other => other,
    }
}

fn as_const_bool(expr: &ExprHandle) -> Option<bool> {
    match expr.node() {
        crate::ir::expr::Expr::ImmBool(b) => Some(*b),
        crate::ir::expr::Expr::ImmLong(v) => Some(*v != 0),
        _ => None,
    }
}
