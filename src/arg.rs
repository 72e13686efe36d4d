//! `ArgValue`: the tagged union lowerings pattern-match on, favored over
//! pointer-polymorphism here since each lowering switches on tag anyway.

use crate::error::{KernelError, Result};
use crate::graph::{ConstantPayload, Subgraph, ValueKind};
use crate::kernel::state::KernelState;

#[derive(Debug, Clone)]
pub enum ArgValue {
    Buffer(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
    BufferList(Vec<String>),
    None,
}

impl ArgValue {
    pub fn as_buffer(&self) -> Option<&str> {
        match self {
            ArgValue::Buffer(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ArgValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ArgValue::None)
    }
}

/// `toArg`: converts one graph value into its lowering-facing representation.
pub fn to_arg(graph: &Subgraph, state: &KernelState, value_id: usize) -> Result<ArgValue> {
    if let Some(name) = state.bufs.get(&value_id) {
        return Ok(ArgValue::Buffer(name.clone()));
    }
    let value = graph.value(value_id);

    if let Some(node) = graph
        .nodes
        .iter()
        .find(|n| n.kind == "ListConstruct" && n.outputs.first() == Some(&value_id))
    {
        return to_arg_list(graph, state, &node.inputs);
    }

    if let Some(node) = graph
        .nodes
        .iter()
        .find(|n| n.kind == "Constant" && n.outputs.first() == Some(&value_id))
    {
        if let Some(payload) = &node.constant_value {
            return Ok(constant_to_arg(payload));
        }
    }

    if value.kind == ValueKind::None {
        return Ok(ArgValue::None);
    }

    if let Some(var) = state.scalars.get(&value_id) {
        return Ok(ArgValue::Buffer(var.clone()));
    }

    Err(KernelError::MalformedInput(format!(
        "no binding found for graph value {value_id} (kind {:?})",
        value.kind
    )))
}

fn to_arg_list(graph: &Subgraph, state: &KernelState, elements: &[usize]) -> Result<ArgValue> {
    if elements.is_empty() {
        return Ok(ArgValue::BufferList(vec![]));
    }
    let args: Result<Vec<ArgValue>> = elements.iter().map(|&id| to_arg(graph, state, id)).collect();
    let args = args?;

    if args.iter().all(|a| matches!(a, ArgValue::Buffer(_))) {
        let bufs = args
            .into_iter()
            .map(|a| match a {
                ArgValue::Buffer(b) => b,
                _ => unreachable!(),
            })
            .collect();
        return Ok(ArgValue::BufferList(bufs));
    }
    if args.iter().all(|a| matches!(a, ArgValue::Int(_))) {
        let ints = args
            .into_iter()
            .map(|a| match a {
                ArgValue::Int(i) => i,
                _ => unreachable!(),
            })
            .collect();
        return Ok(ArgValue::IntList(ints));
    }
    if args.iter().all(|a| matches!(a, ArgValue::Double(_))) {
        let doubles = args
            .into_iter()
            .map(|a| match a {
                ArgValue::Double(d) => d,
                _ => unreachable!(),
            })
            .collect();
        return Ok(ArgValue::DoubleList(doubles));
    }
    Err(KernelError::MalformedInput(
        "ListConstruct elements are not homogeneous buffers, ints, or doubles".into(),
    ))
}

fn constant_to_arg(payload: &ConstantPayload) -> ArgValue {
    match payload {
        ConstantPayload::Int(v) => ArgValue::Int(*v),
        ConstantPayload::Double(v) => ArgValue::Double(*v),
        ConstantPayload::Bool(v) => ArgValue::Bool(*v),
        ConstantPayload::IntList(v) => ArgValue::IntList(v.clone()),
        ConstantPayload::DoubleList(v) => ArgValue::DoubleList(v.clone()),
        ConstantPayload::Tensor { .. } | ConstantPayload::CustomClass => ArgValue::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Value};

    fn empty_state() -> KernelState {
        KernelState::default()
    }

    #[test]
    fn bound_buffer_short_circuits() {
        let graph = Subgraph::default();
        let mut state = empty_state();
        state.bufs.insert(3, "buf3".into());
        let arg = to_arg(&graph, &state, 3).unwrap();
        assert_eq!(arg.as_buffer(), Some("buf3"));
    }

    #[test]
    fn int_list_construct_becomes_int_list() {
        let mut graph = Subgraph::default();
        graph.values.push(Value::scalar(0, ValueKind::Int, crate::ir::Dtype::Long));
        graph.values.push(Value::scalar(1, ValueKind::Int, crate::ir::Dtype::Long));
        graph.values.push(Value::tensor(2));
        graph.nodes.push(Node {
            kind: "Constant".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![0],
            constant_value: Some(ConstantPayload::Int(1)),
        });
        graph.nodes.push(Node {
            kind: "Constant".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![1],
            constant_value: Some(ConstantPayload::Int(2)),
        });
        graph.nodes.push(Node {
            kind: "ListConstruct".into(),
            schema: String::new(),
            inputs: vec![0, 1],
            outputs: vec![2],
            constant_value: None,
        });
        let state = empty_state();
        let arg = to_arg(&graph, &state, 2).unwrap();
        match arg {
            ArgValue::IntList(v) => assert_eq!(v, vec![1, 2]),
            other => panic!("expected IntList, got {other:?}"),
        }
    }

    #[test]
    fn empty_list_defaults_to_buffer_list() {
        let mut graph = Subgraph::default();
        graph.values.push(Value::tensor(0));
        graph.nodes.push(Node {
            kind: "ListConstruct".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![0],
            constant_value: None,
        });
        let state = empty_state();
        let arg = to_arg(&graph, &state, 0).unwrap();
        assert!(matches!(arg, ArgValue::BufferList(v) if v.is_empty()));
    }
}
