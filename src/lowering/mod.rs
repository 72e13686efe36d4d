//! Lowering Dispatcher: for each graph node output with uses, builds an
//! argument list and dispatches to a registered lowering function, custom
//! registry first, standard registry second.

pub mod standard;

use crate::arg::{to_arg, ArgValue};
use crate::error::{KernelError, Result};
use crate::graph::{Device, Node, Subgraph};
use crate::ir::{ComputeTensor, Dtype, ExprHandle};
use crate::kernel::state::KernelState;
use std::collections::HashMap;

/// A lowering: operator + args + output shape/dtype/device -> compute
/// tensor. A closure table stands in for a "single lower method" interface
/// here, since a trait per-arity would need one impl per operator anyway.
pub type LowerFn = fn(&[ArgValue], &[ExprHandle], Dtype, Device) -> Result<ComputeTensor>;

#[derive(Debug, Default)]
pub struct Registry {
    by_key: HashMap<String, LowerFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, f: LowerFn) {
        self.by_key.insert(key.into(), f);
    }

    pub fn get(&self, key: &str) -> Option<LowerFn> {
        self.by_key.get(key).copied()
    }
}

pub struct LoweringDispatcher<'a> {
    graph: &'a Subgraph,
    custom: &'a Registry,
    standard: &'a Registry,
    device: Device,
}

impl<'a> LoweringDispatcher<'a> {
    pub fn new(graph: &'a Subgraph, custom: &'a Registry, standard: &'a Registry, device: Device) -> Self {
        Self {
            graph,
            custom,
            standard,
            device,
        }
    }

    /// Runs every node with a used output through dispatch, in graph order,
    /// binding each output buffer into `state` and returning the produced
    /// compute tensors in definition order.
    pub fn lower_all(&self, state: &mut KernelState) -> Result<Vec<ComputeTensor>> {
        let mut computes = vec![];
        for node in &self.graph.nodes {
            if node.kind == "Constant" || node.kind == "ListConstruct" {
                continue;
            }
            let Some(&out) = node.outputs.first() else {
                continue;
            };
            if state.bufs.contains_key(&out) || !self.has_uses(out) {
                continue;
            }
            let compute = self.lower_node(state, node, out)?;
            state.bufs.insert(out, compute.buf.name.clone());
            state.register_buffer(compute.buf.clone());
            computes.push(compute);
        }
        Ok(computes)
    }

    fn has_uses(&self, value_id: usize) -> bool {
        self.graph.graph_outputs.contains(&value_id)
            || self.graph.nodes.iter().any(|n| n.inputs.contains(&value_id))
    }

    fn lower_node(&self, state: &mut KernelState, node: &Node, out: usize) -> Result<ComputeTensor> {
        let args = self.build_args(state, node)?;
        let out_value = self.graph.value(out);
        let out_shape = state.shapes.sizes_for_value(
            out_value.symbolic_shape.as_deref(),
            false,
            false,
            out_value.concrete_sizes.as_deref(),
            &node.kind,
        )?;
        let out_dtype = out_value.scalar_dtype.ok_or_else(|| {
            KernelError::MalformedInput(format!(
                "output of node `{}` has no scalar dtype (unset dtype is not silently defaulted)",
                node.kind
            ))
        })?;

        let lower_fn = self
            .custom
            .get(&node.kind)
            .or_else(|| self.standard.get(&node.schema))
            .ok_or_else(|| {
                KernelError::UnsupportedSchema(format!(
                    "no lowering for kind `{}` schema `{}`",
                    node.kind, node.schema
                ))
            })?;

        let is_random = node.kind.contains("rand");
        let is_broadcast = args.iter().any(|a| matches!(a, ArgValue::Buffer(_)))
            && !out_shape.is_empty()
            && node.kind.contains("broadcast");
        if is_random {
            state.has_random = true;
        }
        if is_broadcast {
            state.has_broadcast = true;
        }
        if state.has_random && state.has_broadcast {
            return Err(KernelError::RandomBroadcastConflict);
        }

        lower_fn(&args, &out_shape, out_dtype, self.device)
    }

    fn build_args(&self, state: &KernelState, node: &Node) -> Result<Vec<ArgValue>> {
        match node.kind.as_str() {
            "ConstantChunk" => {
                let input0 = to_arg(self.graph, state, node.inputs[0])?;
                // output_offset, dim, chunks are embedded on the node for a
                // ConstantChunk; modeled here as the remaining inputs.
                let rest: Result<Vec<ArgValue>> = node.inputs[1..]
                    .iter()
                    .map(|&id| to_arg(self.graph, state, id))
                    .collect();
                let mut args = vec![input0];
                args.extend(rest?);
                Ok(args)
            }
            "to" => Ok(vec![to_arg(self.graph, state, node.inputs[0])?]),
            "quantize_per_tensor" => {
                let mut args = vec![];
                for (i, &input) in node.inputs.iter().enumerate() {
                    let arg = to_arg(self.graph, state, input)?;
                    // Positions 1 (scale) and 2 (zero_point) unbox 0-dim
                    // constant tensors of supported dtype to scalars.
                    if (i == 1 || i == 2) && self.is_unboxable_scalar_tensor(input) {
                        args.push(self.unbox_scalar_tensor(input)?);
                    } else {
                        args.push(arg);
                    }
                }
                Ok(args)
            }
            "conv2d" => {
                let mut args = vec![];
                for &input in &node.inputs {
                    let arg = to_arg(self.graph, state, input)?;
                    if arg.is_none() {
                        // Bias is none: synthesize a zero bias buffer of
                        // shape [C_out]. C_out is the weight's 0th dim,
                        // assumed to be inputs[1].
                        args.push(ArgValue::Buffer(self.synth_zero_bias_name(node)?));
                    } else {
                        args.push(arg);
                    }
                }
                Ok(args)
            }
            _ => node
                .inputs
                .iter()
                .map(|&id| to_arg(self.graph, state, id))
                .collect(),
        }
    }

    fn is_unboxable_scalar_tensor(&self, value_id: usize) -> bool {
        let value = self.graph.value(value_id);
        value.concrete_sizes.as_deref() == Some(&[])
            && matches!(value.scalar_dtype, Some(Dtype::Float) | Some(Dtype::Long))
    }

    fn unbox_scalar_tensor(&self, value_id: usize) -> Result<ArgValue> {
        let value = self.graph.value(value_id);
        match value.scalar_dtype {
            Some(Dtype::Float) => Ok(ArgValue::Double(0.0)),
            Some(Dtype::Long) => Ok(ArgValue::Int(0)),
            _ => Err(KernelError::UnsupportedSchema(format!(
                "cannot unbox scalar tensor {value_id} of dtype {:?}",
                value.scalar_dtype
            ))),
        }
    }

    fn synth_zero_bias_name(&self, node: &Node) -> Result<String> {
        let weight_id = *node.inputs.get(1).ok_or_else(|| {
            KernelError::MalformedInput("conv2d node missing weight input".into())
        })?;
        let weight = self.graph.value(weight_id);
        let c_out = weight
            .concrete_sizes
            .as_ref()
            .and_then(|s| s.first())
            .copied()
            .ok_or_else(|| {
                KernelError::MalformedInput("conv2d weight has no known C_out dim".into())
            })?;
        Ok(format!("zero_bias_{c_out}"))
    }
}
