use crate::ir::{simplify_expr, Stmt};

/// Recursively applies [`simplify_expr`] to every expression reachable from
/// a statement tree: loop bounds, store indices/values, and conditions.
/// Used both as step 1 (pre-transform) and step 9 (re-simplify) of the
/// loop-nest pipeline.
pub fn simplify_stmt(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => Stmt::For {
            var,
            start: simplify_expr(&start),
            stop: simplify_expr(&stop),
            body: Box::new(simplify_stmt(*body)),
            parallel,
            gpu_axis,
            vectorized,
        },
        Stmt::Store { buf, indices, value } => Stmt::Store {
            buf,
            indices: indices.iter().map(simplify_expr).collect(),
            value: simplify_expr(&value),
        },
        Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(simplify_stmt).collect()),
        Stmt::Cond { cond, then_branch, else_branch } => Stmt::Cond {
            cond: simplify_expr(&cond),
            then_branch: Box::new(simplify_stmt(*then_branch)),
            else_branch: else_branch.map(|b| Box::new(simplify_stmt(*b))),
        },
        other @ (Stmt::Allocate { .. } | Stmt::Free { .. }) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, ExprHandle};

    #[test]
    fn folds_constant_bounds() {
        let stmt = Stmt::for_loop(
            "i",
            ExprHandle::imm_long(0),
            ExprHandle::binary(BinOp::Add, ExprHandle::imm_long(2), ExprHandle::imm_long(2)),
            Stmt::Store { buf: "a".into(), indices: vec![], value: ExprHandle::imm_long(0) },
        );
        let simplified = simplify_stmt(stmt);
        match simplified {
            Stmt::For { stop, .. } => assert_eq!(stop.as_const_long(), Some(4)),
            _ => panic!("expected For"),
        }
    }
}
