use super::Dtype;
use std::rc::Rc;

/// A node in the scalar expression tree: sizes, strides, indices, and the
/// per-element computation a [`super::ComputeTensor`] performs.
///
/// Shared ownership (`Rc`) lets passes clone subtrees cheaply during
/// inlining and simplification without needing an arena, matching the
/// avoiding an arena index scheme for a small amount of sharing overhead.
#[derive(Debug, Clone)]
pub enum Expr {
    ImmLong(i64),
    ImmDouble(f64),
    ImmBool(bool),
    Var(String, Dtype),
    Load(String, Vec<ExprHandle>),
    Binary(BinOp, ExprHandle, ExprHandle),
    Cast(Dtype, ExprHandle),
    Neg(ExprHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Max,
    Min,
    Lt,
    Gt,
    Eq,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct ExprHandle(Rc<Expr>);

impl ExprHandle {
    pub fn new(expr: Expr) -> Self {
        Self(Rc::new(expr))
    }

    pub fn imm_long(v: i64) -> Self {
        Self::new(Expr::ImmLong(v))
    }

    pub fn imm_double(v: f64) -> Self {
        Self::new(Expr::ImmDouble(v))
    }

    pub fn imm_bool(v: bool) -> Self {
        Self::new(Expr::ImmBool(v))
    }

    pub fn var(name: impl Into<String>, dtype: Dtype) -> Self {
        Self::new(Expr::Var(name.into(), dtype))
    }

    pub fn load(buf: impl Into<String>, indices: Vec<ExprHandle>) -> Self {
        Self::new(Expr::Load(buf.into(), indices))
    }

    pub fn binary(op: BinOp, lhs: ExprHandle, rhs: ExprHandle) -> Self {
        Self::new(Expr::Binary(op, lhs, rhs))
    }

    pub fn cast(dtype: Dtype, inner: ExprHandle) -> Self {
        Self::new(Expr::Cast(dtype, inner))
    }

    pub fn as_const_long(&self) -> Option<i64> {
        match self.0.as_ref() {
            Expr::ImmLong(v) => Some(*v),
            _ => None,
        }
    }

    pub fn node(&self) -> &Expr {
        &self.0
    }

    /// Structural equality used by horizontal fusion to compare loop bounds:
    /// fuses immediate-child loops whose (start, stop) pairs are constant
    /// and equal.
    pub fn const_eq(&self, other: &ExprHandle) -> bool {
        match (self.as_const_long(), other.as_const_long()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for ExprHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.const_eq(other)
    }
}

/// Arithmetic simplification used by transform::simplify, both as an early
/// pass and as the final re-simplify pass after the rest of the loop-nest
/// transformer has run.
pub fn simplify_expr(expr: &ExprHandle) -> ExprHandle {
    match expr.node() {
        Expr::Binary(op, lhs, rhs) => {
            let lhs = simplify_expr(lhs);
            let rhs = simplify_expr(rhs);
            if let (Some(a), Some(b)) = (lhs.as_const_long(), rhs.as_const_long()) {
                let folded = match op {
                    BinOp::Add => Some(a + b),
                    BinOp::Sub => Some(a - b),
                    BinOp::Mul => Some(a * b),
                    BinOp::Div if b != 0 => Some(a / b),
                    BinOp::Mod if b != 0 => Some(a % b),
                    BinOp::Max => Some(a.max(b)),
                    BinOp::Min => Some(a.min(b)),
                    _ => None,
                };
                if let Some(v) = folded {
                    return ExprHandle::imm_long(v);
                }
            }
            match op {
                BinOp::Add if rhs.as_const_long() == Some(0) => lhs,
                BinOp::Add if lhs.as_const_long() == Some(0) => rhs,
                BinOp::Mul if rhs.as_const_long() == Some(1) => lhs,
                BinOp::Mul if lhs.as_const_long() == Some(1) => rhs,
                BinOp::Mul if rhs.as_const_long() == Some(0) || lhs.as_const_long() == Some(0) => {
                    ExprHandle::imm_long(0)
                }
                _ => ExprHandle::binary(*op, lhs, rhs),
            }
        }
        Expr::Cast(dtype, inner) => ExprHandle::cast(*dtype, simplify_expr(inner)),
        Expr::Neg(inner) => ExprHandle::new(Expr::Neg(simplify_expr(inner))),
        Expr::Load(buf, indices) => {
            ExprHandle::load(buf.clone(), indices.iter().map(simplify_expr).collect())
        }
        _ => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_constant_arithmetic() {
        let e = ExprHandle::binary(BinOp::Add, ExprHandle::imm_long(2), ExprHandle::imm_long(3));
        assert_eq!(simplify_expr(&e).as_const_long(), Some(5));
    }

    #[test]
    fn drops_additive_identity() {
        let v = ExprHandle::var("x", Dtype::Long);
        let e = ExprHandle::binary(BinOp::Add, v.clone(), ExprHandle::imm_long(0));
        let simplified = simplify_expr(&e);
        assert!(matches!(simplified.node(), Expr::Var(name, _) if name == "x"));
    }

    #[test]
    fn drops_multiplicative_identity() {
        let v = ExprHandle::var("x", Dtype::Long);
        let e = ExprHandle::binary(BinOp::Mul, ExprHandle::imm_long(1), v.clone());
        let simplified = simplify_expr(&e);
        assert!(matches!(simplified.node(), Expr::Var(name, _) if name == "x"));
    }
}
