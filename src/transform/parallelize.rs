use crate::ir::Stmt;

/// Minimum total element count before an outer loop is worth handing to a
/// thread pool; below this the parallel dispatch overhead dominates.
pub const GRAIN_SIZE: i64 = 32_768;

/// Marks the outermost loop of a nest as `parallel` when its total (nested)
/// trip count is constant, meets [`GRAIN_SIZE`], and more than one thread
/// is actually available to run it on.
pub fn parallelize(stmt: Stmt, available_threads: usize) -> Stmt {
    if available_threads <= 1 {
        return stmt;
    }
    match stmt {
        Stmt::For { var, start, stop, body, parallel, gpu_axis, vectorized } => {
            let total = total_trip_count(&stop, &body);
            let should_parallelize = total.map(|n| n >= GRAIN_SIZE).unwrap_or(false);
            Stmt::For {
                var,
                start,
                stop,
                body,
                parallel: parallel || should_parallelize,
                gpu_axis,
                vectorized,
            }
        }
        Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(|s| parallelize(s, available_threads)).collect()),
        other => other,
    }
}

fn total_trip_count(stop: &crate::ir::ExprHandle, body: &Stmt) -> Option<i64> {
    let outer = stop.as_const_long()?;
    match body {
        Stmt::For { stop: inner_stop, body: inner_body, .. } => {
            let inner = total_trip_count(inner_stop, inner_body)?;
            outer.checked_mul(inner)
        }
        _ => Some(outer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ExprHandle;

    fn leaf() -> Stmt {
        Stmt::Store { buf: "a".into(), indices: vec![], value: ExprHandle::imm_long(0) }
    }

    #[test]
    fn large_constant_loop_is_parallelized() {
        let stmt = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(100_000), leaf());
        match parallelize(stmt, 4) {
            Stmt::For { parallel, .. } => assert!(parallel),
            _ => panic!(),
        }
    }

    #[test]
    fn small_loop_stays_serial() {
        let stmt = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(16), leaf());
        match parallelize(stmt, 4) {
            Stmt::For { parallel, .. } => assert!(!parallel),
            _ => panic!(),
        }
    }

    #[test]
    fn single_thread_never_parallelizes() {
        let stmt = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(1_000_000), leaf());
        match parallelize(stmt, 1) {
            Stmt::For { parallel, .. } => assert!(!parallel),
            _ => panic!(),
        }
    }
}
