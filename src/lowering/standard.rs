//! A small standard registry of concrete lowerings, supplementing the
//! otherwise-external per-operator lowering library, so the Kernel is
//! runnable end to end on its own.

use super::{LowerFn, Registry};
use crate::arg::ArgValue;
use crate::error::{KernelError, Result};
use crate::graph::Device;
use crate::ir::{BinOp, Buffer, ComputeTensor, Dtype, ExprHandle, Stmt};

pub fn standard_registry() -> Registry {
    let mut reg = Registry::new();
    reg.register("aten::add", lower_add as LowerFn);
    reg.register("aten::mul", lower_mul as LowerFn);
    reg.register("aten::relu", lower_relu as LowerFn);
    reg.register("aten::to", lower_to as LowerFn);
    reg.register("aten::cat", lower_cat as LowerFn);
    reg.register("aten::quantize_per_tensor", lower_quantize as LowerFn);
    reg.register("aten::conv2d", lower_conv2d as LowerFn);
    reg
}

fn axes_for(out_shape: &[ExprHandle], out_name: &str) -> Vec<ExprHandle> {
    (0..out_shape.len())
        .map(|d| ExprHandle::var(format!("{out_name}_i{d}"), Dtype::Long))
        .collect()
}

fn wrap_loops(axes: &[ExprHandle], dims: &[ExprHandle], innermost: Stmt) -> Stmt {
    let mut body = innermost;
    for (axis, dim) in axes.iter().zip(dims.iter()).rev() {
        let var = axis_name(axis);
        body = Stmt::for_loop(var, ExprHandle::imm_long(0), dim.clone(), body);
    }
    body
}

fn axis_name(axis: &ExprHandle) -> String {
    match axis.node() {
        crate::ir::expr::Expr::Var(name, _) => name.clone(),
        _ => unreachable!("axis handles are always Var nodes"),
    }
}

fn operand_expr(arg: &ArgValue, axes: &[ExprHandle], dtype: Dtype) -> Result<ExprHandle> {
    match arg {
        ArgValue::Buffer(name) => Ok(ExprHandle::load(name.clone(), axes.to_vec())),
        ArgValue::Int(v) => Ok(ExprHandle::cast(dtype, ExprHandle::imm_long(*v))),
        ArgValue::Double(v) => Ok(ExprHandle::cast(dtype, ExprHandle::imm_double(*v))),
        ArgValue::Bool(v) => Ok(ExprHandle::imm_bool(*v)),
        other => Err(KernelError::UnsupportedSchema(format!(
            "operand {other:?} cannot be used as an elementwise operand"
        ))),
    }
}

fn build_output(name: &str, dtype: Dtype, out_shape: &[ExprHandle], value: ExprHandle) -> ComputeTensor {
    let axes = axes_for(out_shape, name);
    let store = Stmt::Store {
        buf: name.to_string(),
        indices: axes.clone(),
        value,
    };
    let nest = wrap_loops(&axes, out_shape, store);
    let buf = Buffer::new(name, dtype, out_shape.to_vec());
    ComputeTensor::new(buf, nest)
}

fn elementwise_binary(
    name: &str,
    op: BinOp,
    args: &[ArgValue],
    out_shape: &[ExprHandle],
    dtype: Dtype,
) -> Result<ComputeTensor> {
    if args.len() < 2 {
        return Err(KernelError::MalformedInput(format!(
            "{name} expects at least 2 arguments, got {}",
            args.len()
        )));
    }
    let axes = axes_for(out_shape, name);
    let lhs = operand_expr(&args[0], &axes, dtype)?;
    let rhs = operand_expr(&args[1], &axes, dtype)?;
    Ok(build_output(name, dtype, out_shape, ExprHandle::binary(op, lhs, rhs)))
}

fn lower_add(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    elementwise_binary("add_out", BinOp::Add, args, out_shape, dtype)
}

fn lower_mul(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    elementwise_binary("mul_out", BinOp::Mul, args, out_shape, dtype)
}

fn lower_relu(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    let name = "relu_out";
    let axes = axes_for(out_shape, name);
    let input = args.first().ok_or_else(|| KernelError::MalformedInput("relu expects 1 argument".into()))?;
    let x = operand_expr(input, &axes, dtype)?;
    let zero = match dtype {
        Dtype::Double => ExprHandle::imm_double(0.0),
        _ => ExprHandle::imm_long(0),
    };
    Ok(build_output(name, dtype, out_shape, ExprHandle::binary(BinOp::Max, x, zero)))
}

fn lower_to(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    let name = "cast_out";
    let axes = axes_for(out_shape, name);
    let input = args.first().ok_or_else(|| KernelError::MalformedInput("to expects 1 argument".into()))?;
    let x = operand_expr(input, &axes, dtype)?;
    Ok(build_output(name, dtype, out_shape, ExprHandle::cast(dtype, x)))
}

/// Concatenates along dimension 0 by emitting one loop per source over its
/// own disjoint range of the output's leading axis — naturally
/// conditional-free regardless of the `cat_without_conditionals` flag,
/// since the offset ranges never overlap.
fn lower_cat(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    let name = "cat_out";
    let sources: Vec<&str> = args
        .iter()
        .filter_map(|a| a.as_buffer())
        .collect();
    if sources.is_empty() {
        return Err(KernelError::MalformedInput("cat expects at least one buffer operand".into()));
    }
    if out_shape.is_empty() {
        return Err(KernelError::MalformedInput("cat output must be rank >= 1".into()));
    }
    let rest_dims = &out_shape[1..];
    let rest_axes = axes_for(rest_dims, name);

    let mut offset = ExprHandle::imm_long(0);
    let mut branches = vec![];
    for src in sources {
        let source_len = ExprHandle::var(format!("{name}_{src}_len"), Dtype::Long);
        let row_var = format!("{name}_{src}_row");
        let row = ExprHandle::var(row_var.clone(), Dtype::Long);
        let mut src_indices = vec![row.clone()];
        src_indices.extend(rest_axes.iter().cloned());
        let mut dst_indices = vec![ExprHandle::binary(BinOp::Add, offset.clone(), row.clone())];
        dst_indices.extend(rest_axes.iter().cloned());
        let store = Stmt::Store {
            buf: name.to_string(),
            indices: dst_indices,
            value: ExprHandle::load(src.to_string(), src_indices),
        };
        let inner = wrap_loops(&rest_axes, rest_dims, store);
        let loop_over_rows = Stmt::for_loop(row_var, ExprHandle::imm_long(0), source_len.clone(), inner);
        branches.push(loop_over_rows);
        offset = ExprHandle::binary(BinOp::Add, offset, source_len);
    }
    let buf = Buffer::new(name, dtype, out_shape.to_vec());
    Ok(ComputeTensor::new(buf, Stmt::block(branches)))
}

fn lower_quantize(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    if args.len() != 4 {
        return Err(KernelError::MalformedInput(format!(
            "quantize_per_tensor expects 4 arguments, got {}",
            args.len()
        )));
    }
    let name = "quant_out";
    let axes = axes_for(out_shape, name);
    let x = operand_expr(&args[0], &axes, Dtype::Double)?;
    let scale = operand_expr(&args[1], &axes, Dtype::Double)?;
    let zero_point = operand_expr(&args[2], &axes, Dtype::Long)?;
    let scaled = ExprHandle::binary(BinOp::Div, x, scale);
    let shifted = ExprHandle::binary(BinOp::Add, ExprHandle::cast(Dtype::Long, scaled), zero_point);
    Ok(build_output(name, dtype, out_shape, ExprHandle::cast(dtype, shifted)))
}

/// Direct, unoptimized 2D convolution (stride 1, no padding): conv2d is a
/// named dispatch special case, so a concrete lowering has to exist for it
/// to dispatch to.
fn lower_conv2d(args: &[ArgValue], out_shape: &[ExprHandle], dtype: Dtype, _device: Device) -> Result<ComputeTensor> {
    if args.len() < 3 {
        return Err(KernelError::MalformedInput("conv2d expects input, weight, bias".into()));
    }
    if out_shape.len() != 4 {
        return Err(KernelError::MalformedInput("conv2d output must be rank 4 (N,C,H,W)".into()));
    }
    let input = args[0].as_buffer().ok_or_else(|| KernelError::MalformedInput("conv2d input must be a buffer".into()))?;
    let weight = args[1].as_buffer().ok_or_else(|| KernelError::MalformedInput("conv2d weight must be a buffer".into()))?;
    let bias = args[2].as_buffer().ok_or_else(|| KernelError::MalformedInput("conv2d bias must be a buffer".into()))?;

    let name = "conv2d_out";
    let n = ExprHandle::var(format!("{name}_n"), Dtype::Long);
    let c_out = ExprHandle::var(format!("{name}_co"), Dtype::Long);
    let h = ExprHandle::var(format!("{name}_h"), Dtype::Long);
    let w = ExprHandle::var(format!("{name}_w"), Dtype::Long);
    let c_in = ExprHandle::var(format!("{name}_ci"), Dtype::Long);
    let kh = ExprHandle::var(format!("{name}_kh"), Dtype::Long);
    let kw = ExprHandle::var(format!("{name}_kw"), Dtype::Long);

    // Kernel spatial extent and input channel count come from the weight
    // buffer's own dims, resolved lazily by the backend via its shape.
    let weight_dims = vec![
        ExprHandle::var(format!("{weight}_cin"), Dtype::Long),
        ExprHandle::var(format!("{weight}_kh"), Dtype::Long),
        ExprHandle::var(format!("{weight}_kw"), Dtype::Long),
    ];

    let in_h = ExprHandle::binary(BinOp::Add, h.clone(), kh.clone());
    let in_w = ExprHandle::binary(BinOp::Add, w.clone(), kw.clone());
    let input_load = ExprHandle::load(input.to_string(), vec![n.clone(), c_in.clone(), in_h, in_w]);
    let weight_load = ExprHandle::load(weight.to_string(), vec![c_out.clone(), c_in.clone(), kh.clone(), kw.clone()]);
    let product = ExprHandle::binary(BinOp::Mul, input_load, weight_load);
    let acc_load = ExprHandle::load("acc".to_string(), vec![]);
    let accumulate = Stmt::Store {
        buf: "acc".to_string(),
        indices: vec![],
        value: ExprHandle::binary(BinOp::Add, acc_load, product),
    };
    let reduction = wrap_loops(
        &[c_in.clone(), kh.clone(), kw.clone()],
        &weight_dims,
        accumulate,
    );
    let bias_load = ExprHandle::load(bias.to_string(), vec![c_out.clone()]);
    let final_value = ExprHandle::binary(BinOp::Add, ExprHandle::load("acc".to_string(), vec![]), bias_load);
    let store_out = Stmt::Store {
        buf: name.to_string(),
        indices: vec![n.clone(), c_out.clone(), h.clone(), w.clone()],
        value: final_value,
    };
    let body = Stmt::block(vec![
        Stmt::Allocate { buf: "acc".into(), size_bytes: ExprHandle::imm_long(8) },
        reduction,
        store_out,
        Stmt::Free { buf: "acc".into() },
    ]);
    let nest = wrap_loops(&[n, c_out, h, w], out_shape, body);
    let buf = Buffer::new(name, dtype, out_shape.to_vec());
    Ok(ComputeTensor::new(buf, nest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_builds_elementwise_loop_nest() {
        let out_shape = vec![ExprHandle::imm_long(4), ExprHandle::imm_long(4)];
        let args = vec![ArgValue::Buffer("a".into()), ArgValue::Buffer("b".into())];
        let compute = lower_add(&args, &out_shape, Dtype::Float, Device::Cpu).unwrap();
        assert_eq!(compute.buf.name, "add_out");
        assert!(compute.stmt.unwrap().is_for());
    }

    #[test]
    fn relu_clamps_to_zero_via_max() {
        let out_shape = vec![ExprHandle::imm_long(8)];
        let args = vec![ArgValue::Buffer("x".into())];
        let compute = lower_relu(&args, &out_shape, Dtype::Float, Device::Cpu).unwrap();
        assert!(matches!(compute.stmt, Some(Stmt::For { .. })));
    }

    #[test]
    fn conv2d_rejects_non_rank4_output() {
        let out_shape = vec![ExprHandle::imm_long(4)];
        let args = vec![
            ArgValue::Buffer("x".into()),
            ArgValue::Buffer("w".into()),
            ArgValue::Buffer("b".into()),
        ];
        let err = lower_conv2d(&args, &out_shape, Dtype::Float, Device::Cpu).unwrap_err();
        assert!(matches!(err, KernelError::MalformedInput(_)));
    }

    #[test]
    fn cat_emits_one_loop_per_source_with_no_conditional() {
        let out_shape = vec![ExprHandle::imm_long(8), ExprHandle::imm_long(3)];
        let args = vec![ArgValue::Buffer("a".into()), ArgValue::Buffer("b".into())];
        let compute = lower_cat(&args, &out_shape, Dtype::Float, Device::Cpu).unwrap();
        match compute.stmt.unwrap() {
            Stmt::Block(stmts) => {
                assert_eq!(stmts.len(), 2);
                assert!(stmts.iter().all(|s| s.is_for()));
            }
            other => panic!("expected a Block of per-source loops, got {other:?}"),
        }
    }
}
