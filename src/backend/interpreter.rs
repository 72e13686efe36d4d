//! A concrete tree-walking interpreter backend: the one backend this crate
//! fully executes rather than treats as an opaque external codegen target.
//! Used whenever no LLVM/CUDA/Block codegen is configured or available.

use crate::error::{KernelError, Result};
use crate::ir::{default_contiguous_strides, ComputeTensor, Stmt};
use crate::kernel::state::KernelState;
use crate::stack::{CallArg, EvalStack};
use std::collections::HashMap;

#[derive(Default)]
struct Env {
    scalars: HashMap<String, f64>,
    buffers: HashMap<String, Vec<f64>>,
    shapes: HashMap<String, Vec<i64>>,
}

pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Binds `stack` against `buffer_args` order, allocates every
    /// remaining known buffer by its resolved shape, executes every
    /// compute tensor's statement tree in order, then returns every output
    /// buffer's final contents.
    pub fn execute(
        &self,
        computes: &[ComputeTensor],
        state: &KernelState,
        stack: &EvalStack,
    ) -> Result<HashMap<String, Vec<f64>>> {
        if stack.len() != state.buffer_args.len() {
            return Err(KernelError::MalformedInput(format!(
                "call stack has {} args, kernel expects {}",
                stack.len(),
                state.buffer_args.len()
            )));
        }

        let mut env = Env::default();
        for (name, arg) in state.buffer_args.iter().zip(stack.iter()) {
            match arg {
                CallArg::Buffer(v) => {
                    env.buffers.insert(name.clone(), v.clone());
                }
                CallArg::Scalar(v) => {
                    env.scalars.insert(name.clone(), *v);
                }
            }
        }

        for (name, buf) in &state.buffers {
            let shape: Vec<i64> = buf
                .dims
                .iter()
                .map(|d| eval_expr(d, &env).round() as i64)
                .collect();
            env.shapes.insert(name.clone(), shape.clone());
            if !env.buffers.contains_key(name) {
                let len = shape.iter().product::<i64>().max(1) as usize;
                env.buffers.insert(name.clone(), vec![0.0; len]);
            }
        }

        for compute in computes {
            if let Some(stmt) = &compute.stmt {
                exec_stmt(stmt, &mut env)?;
            }
        }

        let mut outputs = HashMap::new();
        for name in &state.buf_outputs {
            let data = env
                .buffers
                .get(name)
                .cloned()
                .ok_or_else(|| KernelError::InternalAssertion(format!("output buffer `{name}` was never produced")))?;
            outputs.insert(name.clone(), data);
        }
        Ok(outputs)
    }
}

fn exec_stmt(stmt: &Stmt, env: &mut Env) -> Result<()> {
    match stmt {
        Stmt::For { var, start, stop, body, .. } => {
            let start = eval_expr(start, env).round() as i64;
            let stop = eval_expr(stop, env).round() as i64;
            for i in start..stop {
                env.scalars.insert(var.clone(), i as f64);
                exec_stmt(body, env)?;
            }
            Ok(())
        }
        Stmt::Store { buf, indices, value } => {
            let idx: Vec<i64> = indices.iter().map(|i| eval_expr(i, env).round() as i64).collect();
            let v = eval_expr(value, env);
            let shape = env.shapes.get(buf).cloned().unwrap_or_default();
            let offset = flat_offset(&shape, &idx);
            let storage = env
                .buffers
                .get_mut(buf)
                .ok_or_else(|| KernelError::InternalAssertion(format!("store into unallocated buffer `{buf}`")))?;
            if offset >= storage.len() {
                return Err(KernelError::InternalAssertion(format!(
                    "store offset {offset} out of bounds for buffer `{buf}` of length {}",
                    storage.len()
                )));
            }
            storage[offset] = v;
            Ok(())
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                exec_stmt(s, env)?;
            }
            Ok(())
        }
        Stmt::Cond { cond, then_branch, else_branch } => {
            if eval_expr(cond, env) != 0.0 {
                exec_stmt(then_branch, env)
            } else if let Some(e) = else_branch {
                exec_stmt(e, env)
            } else {
                Ok(())
            }
        }
        Stmt::Allocate { buf, .. } => {
            env.buffers.entry(buf.clone()).or_insert_with(|| vec![0.0; 1]);
            Ok(())
        }
        Stmt::Free { .. } => Ok(()),
    }
}

fn eval_expr(expr: &crate::ir::ExprHandle, env: &Env) -> f64 {
    use crate::ir::expr::Expr;
    use crate::ir::BinOp;
    match expr.node() {
        Expr::ImmLong(v) => *v as f64,
        Expr::ImmDouble(v) => *v,
        Expr::ImmBool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Expr::Var(name, _) => env.scalars.get(name).copied().unwrap_or(0.0),
        Expr::Load(buf, indices) => {
            let idx: Vec<i64> = indices.iter().map(|i| eval_expr(i, env).round() as i64).collect();
            let shape = env.shapes.get(buf).cloned().unwrap_or_default();
            let offset = flat_offset(&shape, &idx);
            env.buffers.get(buf).and_then(|v| v.get(offset)).copied().unwrap_or(0.0)
        }
        Expr::Binary(op, lhs, rhs) => {
            let a = eval_expr(lhs, env);
            let b = eval_expr(rhs, env);
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a % b,
                BinOp::Max => a.max(b),
                BinOp::Min => a.min(b),
                BinOp::Lt => bool_f64(a < b),
                BinOp::Gt => bool_f64(a > b),
                BinOp::Eq => bool_f64(a == b),
                BinOp::And => bool_f64(a != 0.0 && b != 0.0),
                BinOp::Or => bool_f64(a != 0.0 || b != 0.0),
            }
        }
        Expr::Cast(_, inner) => eval_expr(inner, env),
        Expr::Neg(inner) => -eval_expr(inner, env),
    }
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn flat_offset(shape: &[i64], indices: &[i64]) -> usize {
    if indices.is_empty() {
        return 0;
    }
    let strides = default_contiguous_strides(shape);
    indices.iter().zip(strides.iter()).map(|(i, s)| i * s).sum::<i64>().max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Buffer, Dtype, ExprHandle};

    #[test]
    fn executes_elementwise_add_over_two_buffers() {
        let out_name = "add_out";
        let axis = ExprHandle::var("i", Dtype::Long);
        let store = Stmt::Store {
            buf: out_name.into(),
            indices: vec![axis.clone()],
            value: ExprHandle::binary(
                crate::ir::BinOp::Add,
                ExprHandle::load("a", vec![axis.clone()]),
                ExprHandle::load("b", vec![axis]),
            ),
        };
        let nest = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(4), store);
        let buf = Buffer::new(out_name, Dtype::Float, vec![ExprHandle::imm_long(4)]);
        let compute = ComputeTensor::new(buf.clone(), nest);

        let mut state = KernelState::default();
        state.buffer_args = vec!["a".into(), "b".into()];
        state.buf_outputs.insert(out_name.into());
        state.register_buffer(Buffer::new("a", Dtype::Float, vec![ExprHandle::imm_long(4)]));
        state.register_buffer(Buffer::new("b", Dtype::Float, vec![ExprHandle::imm_long(4)]));
        state.register_buffer(buf);

        let stack = EvalStack::new(vec![
            CallArg::Buffer(vec![1.0, 2.0, 3.0, 4.0]),
            CallArg::Buffer(vec![10.0, 20.0, 30.0, 40.0]),
        ]);
        let result = Interpreter::new().execute(&[compute], &state, &stack).unwrap();
        assert_eq!(result[out_name], vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn rejects_stack_length_mismatch() {
        let mut state = KernelState::default();
        state.buffer_args = vec!["a".into()];
        let stack = EvalStack::new(vec![]);
        let err = Interpreter::new().execute(&[], &state, &stack).unwrap_err();
        assert!(matches!(err, KernelError::MalformedInput(_)));
    }
}
