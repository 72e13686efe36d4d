//! Output Restrider: normalizes a graph output's physical layout against
//! the logical (declared) strides a caller expects back, by wrapping the
//! producing compute tensor's buffer in an index-permutation write-through.

use crate::ir::{BinOp, Buffer, ComputeTensor, Dtype, ExprHandle, Stmt};

/// If `declared_strides` differs from the buffer's own contiguous strides,
/// emits a second buffer in the declared layout and a loop nest that reads
/// `compute`'s natural (contiguous) storage through the permutation formula
/// and writes it out in the declared order. Otherwise returns `compute`
/// unchanged.
pub fn restride_output(compute: ComputeTensor, declared_strides: &[i64]) -> ComputeTensor {
    let natural = match compute.buf.default_contiguous_strides() {
        Some(s) => s,
        None => return compute, // symbolic dims: layout is left to the backend
    };
    if natural == declared_strides {
        return compute;
    }

    let sizes: Vec<i64> = compute
        .buf
        .dims
        .iter()
        .map(|d| d.as_const_long().expect("constant dims checked by default_contiguous_strides"))
        .collect();

    let out_name = format!("{}_restrided", compute.buf.name);
    let axes: Vec<ExprHandle> = (0..sizes.len())
        .map(|d| ExprHandle::var(format!("{out_name}_i{d}"), Dtype::Long))
        .collect();

    let mut dest_offset = ExprHandle::imm_long(0);
    for (axis, &stride) in axes.iter().zip(declared_strides.iter()) {
        let term = ExprHandle::binary(BinOp::Mul, axis.clone(), ExprHandle::imm_long(stride));
        dest_offset = ExprHandle::binary(BinOp::Add, dest_offset, term);
    }

    let loaded = ExprHandle::load(compute.buf.name.clone(), axes.clone());
    let store = Stmt::Store {
        buf: out_name.clone(),
        indices: vec![dest_offset],
        value: loaded,
    };
    let mut body = store;
    for (axis, &size) in axes.iter().zip(sizes.iter()).rev() {
        let var = match axis.node() {
            crate::ir::expr::Expr::Var(name, _) => name.clone(),
            _ => unreachable!("axis handles are always Var nodes"),
        };
        body = Stmt::for_loop(var, ExprHandle::imm_long(0), ExprHandle::imm_long(size), body);
    }

    let out_buf = Buffer::new(out_name, compute.buf.dtype, compute.buf.dims.clone());
    let restrided = ComputeTensor::new(out_buf, body);

    // The producer's own statement must still run first so its buffer is
    // populated before the permutation pass reads it.
    match (compute.stmt, restrided.stmt) {
        (Some(producer), Some(permute)) => ComputeTensor::new(restrided.buf, Stmt::block(vec![producer, permute])),
        (None, Some(permute)) => ComputeTensor::new(restrided.buf, permute),
        _ => unreachable!("restride always produces a statement"),
    }
}
