use crate::ir::Stmt;

/// Horizontal loop fusion: merges adjacent top-level `For` statements in a
/// `Block` whose `(start, stop)` pairs are constant and equal into a single
/// loop over a concatenated body, so independent elementwise computations
/// over the same extent share one pass. CPU only — CUDA/Block lower to a
/// flattened single axis instead (see [`super::gpu_split`]), so fusion at
/// this stage would be redone anyway.
pub fn fuse_horizontal(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Block(stmts) => {
            let mut fused: Vec<Stmt> = vec![];
            for s in stmts.into_iter().map(fuse_horizontal) {
                match (fused.last_mut(), &s) {
                    (
                        Some(Stmt::For { var: var_a, start: start_a, stop: stop_a, body: body_a, .. }),
                        Stmt::For { start: start_b, stop: stop_b, body: body_b, var: var_b, .. },
                    ) if start_a.const_eq(start_b) && stop_a.const_eq(stop_b) => {
                        let renamed_b = rename_var(body_b.as_ref().clone(), var_b, var_a);
                        *body_a = Box::new(Stmt::Block(vec![(**body_a).clone(), renamed_b]));
                    }
                    _ => fused.push(s),
                }
            }
            if fused.len() == 1 {
                fused.into_iter().next().unwrap()
            } else {
                Stmt::Block(fused)
            }
        }
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => Stmt::For {
            var,
            start,
            stop,
            body: Box::new(fuse_horizontal(*body)),
            parallel,
            gpu_axis,
            vectorized,
        },
        other => other,
    }
}

fn rename_var(stmt: Stmt, from: &str, to: &str) -> Stmt {
    use crate::ir::ExprHandle;
    fn rename_expr(expr: &ExprHandle, from: &str, to: &str) -> ExprHandle {
        use crate::ir::expr::Expr;
        match expr.node() {
            Expr::Var(name, dtype) if name == from => ExprHandle::var(to, *dtype),
            Expr::Load(buf, indices) => {
                ExprHandle::load(buf.clone(), indices.iter().map(|i| rename_expr(i, from, to)).collect())
            }
            Expr::Binary(op, lhs, rhs) => ExprHandle::binary(*op, rename_expr(lhs, from, to), rename_expr(rhs, from, to)),
            Expr::Cast(dtype, inner) => ExprHandle::cast(*dtype, rename_expr(inner, from, to)),
            _ => expr.clone(),
        }
    }
    match stmt {
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => Stmt::For {
            var,
            start: rename_expr(&start, from, to),
            stop: rename_expr(&stop, from, to),
            body: Box::new(rename_var(*body, from, to)),
            parallel,
            gpu_axis,
            vectorized,
        },
        Stmt::Store { buf, indices, value } => Stmt::Store {
            buf,
            indices: indices.iter().map(|i| rename_expr(i, from, to)).collect(),
            value: rename_expr(&value, from, to),
        },
        Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(|s| rename_var(s, from, to)).collect()),
        Stmt::Cond { cond, then_branch, else_branch } => Stmt::Cond {
            cond: rename_expr(&cond, from, to),
            then_branch: Box::new(rename_var(*then_branch, from, to)),
            else_branch: else_branch.map(|b| Box::new(rename_var(*b, from, to))),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ExprHandle;

    #[test]
    fn fuses_loops_with_equal_constant_bounds() {
        let a = Stmt::for_loop(
            "i",
            ExprHandle::imm_long(0),
            ExprHandle::imm_long(4),
            Stmt::Store { buf: "a".into(), indices: vec![ExprHandle::var("i", crate::ir::Dtype::Long)], value: ExprHandle::imm_long(1) },
        );
        let b = Stmt::for_loop(
            "j",
            ExprHandle::imm_long(0),
            ExprHandle::imm_long(4),
            Stmt::Store { buf: "b".into(), indices: vec![ExprHandle::var("j", crate::ir::Dtype::Long)], value: ExprHandle::imm_long(2) },
        );
        let fused = fuse_horizontal(Stmt::Block(vec![a, b]));
        assert!(fused.is_for());
    }

    #[test]
    fn leaves_mismatched_bounds_unfused() {
        let a = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(4), Stmt::Block(vec![]));
        let b = Stmt::for_loop("j", ExprHandle::imm_long(0), ExprHandle::imm_long(8), Stmt::Block(vec![]));
        let fused = fuse_horizontal(Stmt::Block(vec![a, b]));
        match fused {
            Stmt::Block(stmts) => assert_eq!(stmts.len(), 2),
            _ => panic!("expected unfused Block"),
        }
    }
}
