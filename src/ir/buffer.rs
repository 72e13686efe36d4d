use super::{Dtype, ExprHandle, Stmt};

/// A named, dtyped, ranked region with a dimension vector of IR expressions.
/// Created by the Input Binder, Constant Binder, or a lowering; referenced
/// by [`crate::arg::ArgValue::Buffer`] handles throughout compilation.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub name: String,
    pub dtype: Dtype,
    pub dims: Vec<ExprHandle>,
}

impl Buffer {
    pub fn new(name: impl Into<String>, dtype: Dtype, dims: Vec<ExprHandle>) -> Self {
        Self {
            name: name.into(),
            dtype,
            dims,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// True when every dimension is a compile-time constant, the
    /// precondition for static pre-allocation.
    pub fn has_constant_dims(&self) -> bool {
        self.dims.iter().all(|d| d.as_const_long().is_some())
    }

    pub fn constant_element_count(&self) -> Option<i64> {
        let mut total: i64 = 1;
        for d in &self.dims {
            total = total.checked_mul(d.as_const_long()?)?;
        }
        Some(total)
    }

    pub fn default_contiguous_strides(&self) -> Option<Vec<i64>> {
        let sizes: Option<Vec<i64>> = self.dims.iter().map(|d| d.as_const_long()).collect();
        let sizes = sizes?;
        Some(default_contiguous_strides(&sizes))
    }
}

/// Row-major contiguous strides for the given sizes.
pub fn default_contiguous_strides(sizes: &[i64]) -> Vec<i64> {
    let mut strides = vec![1i64; sizes.len()];
    for i in (0..sizes.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * sizes[i + 1];
    }
    strides
}

/// A buffer together with the statement that produces it. Either field may
/// be empty for pure pass-through bindings (a direct input buffer has no
/// producer statement).
#[derive(Debug, Clone)]
pub struct ComputeTensor {
    pub buf: Buffer,
    pub stmt: Option<Stmt>,
}

impl ComputeTensor {
    pub fn new(buf: Buffer, stmt: Stmt) -> Self {
        Self {
            buf,
            stmt: Some(stmt),
        }
    }

    pub fn pass_through(buf: Buffer) -> Self {
        Self { buf, stmt: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_row_major_strides() {
        assert_eq!(default_contiguous_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(default_contiguous_strides(&[5]), vec![1]);
        assert_eq!(default_contiguous_strides(&[]), Vec::<i64>::new());
    }

    #[test]
    fn constant_element_count_multiplies_dims() {
        let buf = Buffer::new(
            "t",
            Dtype::Float,
            vec![ExprHandle::imm_long(2), ExprHandle::imm_long(8)],
        );
        assert_eq!(buf.constant_element_count(), Some(16));
    }

    #[test]
    fn symbolic_dim_has_no_constant_count() {
        let buf = Buffer::new(
            "t",
            Dtype::Float,
            vec![ExprHandle::var("ss1", Dtype::Long), ExprHandle::imm_long(8)],
        );
        assert!(!buf.has_constant_dims());
        assert_eq!(buf.constant_element_count(), None);
    }
}
