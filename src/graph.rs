//! External dataflow graph model.
//!
//! The upstream graph optimizer is an external collaborator; this module is
//! the minimal typed surface the Kernel needs to bind against. A real
//! embedder would adapt their own SSA representation into these types.

use crate::ir::{Dtype, ShapeSymbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Tensor,
    Float,
    Int,
    Bool,
    None,
    List,
}

/// An SSA value: a tensor, scalar, constant, or list produced by some
/// [`Node`] or supplied as a kernel input.
#[derive(Debug, Clone)]
pub struct Value {
    pub id: usize,
    pub kind: ValueKind,
    pub debug_name: Option<String>,
    /// Ordered shape symbols, if this value's rank and per-dim symbol are
    /// known to the graph optimizer.
    pub symbolic_shape: Option<Vec<ShapeSymbol>>,
    pub concrete_sizes: Option<Vec<i64>>,
    pub concrete_strides: Option<Vec<i64>>,
    pub scalar_dtype: Option<Dtype>,
}

impl Value {
    pub fn tensor(id: usize) -> Self {
        Self {
            id,
            kind: ValueKind::Tensor,
            debug_name: None,
            symbolic_shape: None,
            concrete_sizes: None,
            concrete_strides: None,
            scalar_dtype: None,
        }
    }

    pub fn scalar(id: usize, kind: ValueKind, dtype: Dtype) -> Self {
        Self {
            id,
            kind,
            debug_name: None,
            symbolic_shape: None,
            concrete_sizes: None,
            concrete_strides: None,
            scalar_dtype: Some(dtype),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    pub fn with_symbolic_shape(mut self, shape: Vec<ShapeSymbol>) -> Self {
        self.symbolic_shape = Some(shape);
        self
    }

    pub fn with_concrete(mut self, sizes: Vec<i64>, strides: Vec<i64>, dtype: Dtype) -> Self {
        self.concrete_sizes = Some(sizes);
        self.concrete_strides = Some(strides);
        self.scalar_dtype = Some(dtype);
        self
    }

    pub fn is_contiguous(&self) -> bool {
        match (&self.concrete_sizes, &self.concrete_strides) {
            (Some(sizes), Some(strides)) => {
                *strides == crate::ir::buffer::default_contiguous_strides(sizes)
            }
            _ => false,
        }
    }

    pub fn has_complete_type(&self) -> bool {
        self.concrete_sizes.is_some()
    }
}

/// A operator node in the subgraph, keyed by operator symbol (for custom
/// lowerings) and schema string (for the standard registry), per
/// the Lowering Dispatcher's dispatch order.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: String,
    pub schema: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub constant_value: Option<ConstantPayload>,
}

#[derive(Debug, Clone)]
pub enum ConstantPayload {
    Int(i64),
    Double(f64),
    Bool(bool),
    Tensor { data: Vec<u8>, dtype: Dtype, sizes: Vec<i64>, strides: Vec<i64> },
    /// An opaque custom-class payload the backend alone understands.
    CustomClass,
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
}

/// A typed dataflow subgraph: the Kernel's sole compile-time input besides
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    pub values: Vec<Value>,
    pub nodes: Vec<Node>,
    pub graph_inputs: Vec<usize>,
    pub graph_outputs: Vec<usize>,
}

impl Subgraph {
    pub fn value(&self, id: usize) -> &Value {
        self.values.iter().find(|v| v.id == id).unwrap_or_else(|| {
            panic!("internal assertion failed: unknown graph value id {id}")
        })
    }
}
