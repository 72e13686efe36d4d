use super::ExprHandle;

/// GPU axis a loop has been bound to after flatten+split, for the CUDA or
/// Block backend mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuAxis {
    Block(u32),
    Thread(u32),
}

/// A node in the loop-nest statement tree emitted by a lowering and rewritten
/// by the Loop-Nest Transformer.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `for (var in start..stop) { body }`.
    For {
        var: String,
        start: ExprHandle,
        stop: ExprHandle,
        body: Box<Stmt>,
        parallel: bool,
        gpu_axis: Option<GpuAxis>,
        vectorized: bool,
    },
    Store {
        buf: String,
        indices: Vec<ExprHandle>,
        value: ExprHandle,
    },
    Block(Vec<Stmt>),
    Cond {
        cond: ExprHandle,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Allocate {
        buf: String,
        size_bytes: ExprHandle,
    },
    Free {
        buf: String,
    },
}

impl Stmt {
    pub fn for_loop(var: impl Into<String>, start: ExprHandle, stop: ExprHandle, body: Stmt) -> Self {
        Stmt::For {
            var: var.into(),
            start,
            stop,
            body: Box::new(body),
            parallel: false,
            gpu_axis: None,
            vectorized: false,
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block(stmts)
    }

    /// True if `self` or any nested statement carries a reduction-shaped
    /// accumulation: a `Store` into a buffer whose own load appears among
    /// the indices it's nested under is out of scope for this IR (that
    /// would require dataflow analysis over `value`); instead, per the
    /// lowering contract, a lowering marks a loop nest as a reduction by
    /// producing a `Store` whose target buffer differs from the innermost
    /// loop's natural output — callers needing this set `has_reduction`
    /// on the nest explicitly via [`contains_marked_reduction`].
    pub fn contains_marked_reduction(&self, reduction_bufs: &std::collections::HashSet<String>) -> bool {
        match self {
            Stmt::Store { buf, .. } => reduction_bufs.contains(buf),
            Stmt::For { body, .. } => body.contains_marked_reduction(reduction_bufs),
            Stmt::Block(stmts) => stmts.iter().any(|s| s.contains_marked_reduction(reduction_bufs)),
            Stmt::Cond {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.contains_marked_reduction(reduction_bufs)
                    || else_branch
                        .as_ref()
                        .is_some_and(|e| e.contains_marked_reduction(reduction_bufs))
            }
            Stmt::Allocate { .. } | Stmt::Free { .. } => false,
        }
    }

    pub fn is_for(&self) -> bool {
        matches!(self, Stmt::For { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Dtype;
    use std::collections::HashSet;

    #[test]
    fn detects_marked_reduction_in_nested_loop() {
        let inner = Stmt::Store {
            buf: "acc".into(),
            indices: vec![],
            value: ExprHandle::var("x", Dtype::Float),
        };
        let nest = Stmt::for_loop("i", ExprHandle::imm_long(0), ExprHandle::imm_long(4), inner);
        let mut reductions = HashSet::new();
        reductions.insert("acc".to_string());
        assert!(nest.contains_marked_reduction(&reductions));
        assert!(!nest.contains_marked_reduction(&HashSet::new()));
    }
}
