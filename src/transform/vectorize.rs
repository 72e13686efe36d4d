use crate::ir::Stmt;

/// Lane width assumed for the vectorize pass. The actual instruction set is
/// an external codegen concern; this only records the loop's eligibility.
pub const VECTOR_WIDTH: i64 = 8;

/// Marks the innermost loop of a nest as `vectorized` when its trip count
/// is a compile-time multiple of [`VECTOR_WIDTH`] and its body is a single
/// elementwise `Store` (no reduction, no nested control flow).
pub fn vectorize(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => {
            if is_innermost(&body) {
                let eligible = stop
                    .as_const_long()
                    .map(|n| n % VECTOR_WIDTH == 0)
                    .unwrap_or(false)
                    && matches!(body.as_ref(), Stmt::Store { .. });
                return Stmt::For {
                    var,
                    start,
                    stop,
                    body,
                    parallel,
                    gpu_axis,
                    vectorized: vectorized || eligible,
                };
            }
            Stmt::For {
                var,
                start,
                stop,
                body: Box::new(vectorize(*body)),
                parallel,
                gpu_axis,
                vectorized,
            }
        }
        Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(vectorize).collect()),
        other => other,
    }
}

fn is_innermost(body: &Stmt) -> bool {
    !matches!(body, Stmt::For { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ExprHandle;

    #[test]
    fn marks_multiple_of_width_vectorized() {
        let store = Stmt::Store { buf: "a".into(), indices: vec![], value: ExprHandle::imm_long(0) };
        let stmt = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(32), store);
        match vectorize(stmt) {
            Stmt::For { vectorized, .. } => assert!(vectorized),
            _ => panic!(),
        }
    }

    #[test]
    fn non_multiple_stays_unvectorized() {
        let store = Stmt::Store { buf: "a".into(), indices: vec![], value: ExprHandle::imm_long(0) };
        let stmt = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(13), store);
        match vectorize(stmt) {
            Stmt::For { vectorized, .. } => assert!(!vectorized),
            _ => panic!(),
        }
    }
}
