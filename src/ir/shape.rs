use super::ExprHandle;
use crate::error::{KernelError, Result};
use std::collections::HashMap;

/// A single dimension bound, as produced by the upstream graph optimizer:
/// either a concrete size, or an opaque negative id bound to an integer
/// graph input at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeSymbol {
    Static(i64),
    Dynamic(i64),
}

impl ShapeSymbol {
    pub fn dynamic_id(self) -> Option<i64> {
        match self {
            ShapeSymbol::Dynamic(id) => Some(id),
            ShapeSymbol::Static(_) => None,
        }
    }
}

/// Maps symbolic shape symbols to IR variables, one variable per distinct
/// dynamic id, reused across every value that shares that symbol
/// (the `shapeSymbolToVar` invariant).
#[derive(Debug, Default)]
pub struct ShapeResolver {
    var_for_dynamic: HashMap<i64, ExprHandle>,
    /// Graph-input index providing each dynamic shape variable's value at
    /// call time (`shapeSymbolInputPos`).
    input_pos: HashMap<i64, usize>,
}

impl ShapeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `varForShape`: resolves one shape symbol to an expression.
    pub fn var_for_shape(&mut self, symbol: ShapeSymbol) -> ExprHandle {
        match symbol {
            ShapeSymbol::Static(size) => ExprHandle::imm_long(size),
            ShapeSymbol::Dynamic(id) => {
                if let Some(existing) = self.var_for_dynamic.get(&id) {
                    return existing.clone();
                }
                let name = format!("ss{}", id.unsigned_abs());
                let var = ExprHandle::var(name, super::Dtype::Long);
                self.var_for_dynamic.insert(id, var.clone());
                var
            }
        }
    }

    /// Records which graph-input index supplies a dynamic shape symbol's
    /// runtime value. Called once per distinct symbol, from the Input
    /// Binder or the construction-time symbolic shape symbol list.
    pub fn bind_input_pos(&mut self, dynamic_id: i64, input_index: usize) {
        self.input_pos.entry(dynamic_id).or_insert(input_index);
    }

    pub fn input_pos_for(&self, dynamic_id: i64) -> Option<usize> {
        self.input_pos.get(&dynamic_id).copied()
    }

    /// `sizesFromSymbolicShape`: one expression per dimension. Requires a
    /// known rank.
    pub fn sizes_from_symbolic_shape(&mut self, shape: &[ShapeSymbol]) -> Vec<ExprHandle> {
        shape.iter().map(|s| self.var_for_shape(*s)).collect()
    }

    /// `sizesForValue` for a tensor value with a known symbolic shape, or a
    /// scalar/none value. `node_kind` is used only for the error message.
    pub fn sizes_for_value(
        &mut self,
        shape: Option<&[ShapeSymbol]>,
        is_scalar: bool,
        is_none: bool,
        known_sizes: Option<&[i64]>,
        node_kind: &str,
    ) -> Result<Vec<ExprHandle>> {
        if let Some(shape) = shape {
            return Ok(self.sizes_from_symbolic_shape(shape));
        }
        if is_scalar {
            return Ok(vec![ExprHandle::imm_long(1)]);
        }
        if is_none {
            return Ok(vec![]);
        }
        if let Some(sizes) = known_sizes {
            return Ok(sizes.iter().map(|&s| ExprHandle::imm_long(s)).collect());
        }
        Err(KernelError::MalformedInput(format!(
            "cannot resolve sizes for node of kind `{node_kind}`: no symbolic shape, not scalar/none, no known sizes"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_symbol_is_immediate() {
        let mut r = ShapeResolver::new();
        let e = r.var_for_shape(ShapeSymbol::Static(4));
        assert_eq!(e.as_const_long(), Some(4));
    }

    #[test]
    fn dynamic_symbol_is_cached_and_named() {
        use crate::ir::expr::Expr;

        let mut r = ShapeResolver::new();
        let a = r.var_for_shape(ShapeSymbol::Dynamic(-7));
        let b = r.var_for_shape(ShapeSymbol::Dynamic(-7));
        assert!(a.as_const_long().is_none());
        let (Expr::Var(name_a, _), Expr::Var(name_b, _)) = (a.node(), b.node()) else {
            panic!("expected Var nodes");
        };
        assert_eq!(name_a, "ss7");
        assert_eq!(name_a, name_b);
    }

    #[test]
    fn sizes_for_scalar_value_is_singleton() {
        let mut r = ShapeResolver::new();
        let sizes = r
            .sizes_for_value(None, true, false, None, "Float")
            .unwrap();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].as_const_long(), Some(1));
    }

    #[test]
    fn sizes_for_none_value_is_empty() {
        let mut r = ShapeResolver::new();
        let sizes = r
            .sizes_for_value(None, false, true, None, "None")
            .unwrap();
        assert!(sizes.is_empty());
    }

    #[test]
    fn sizes_for_malformed_value_fails_with_kind() {
        let mut r = ShapeResolver::new();
        let err = r
            .sizes_for_value(None, false, false, None, "CustomOp")
            .unwrap_err();
        assert!(format!("{err}").contains("CustomOp"));
    }
}
