use super::sanitize_ident;
use crate::error::{KernelError, Result};
use crate::graph::{Subgraph, Value, ValueKind};
use crate::ir::{BinOp, Buffer, ComputeTensor, Dtype, ExprHandle, Stmt};
use crate::kernel::state::KernelState;
use std::collections::HashSet;

/// Binds every graph input, in graph order, to either a direct buffer (for
/// tensors) or a scalar IR variable.
///
/// `symbolic_shape_ids` is the construction-time list of dynamic shape
/// symbol ids: any Int graph input whose node supplies one of these ids is
/// a "symbolic-shape scalar input" and is appended to `buffer_args` only
/// after every ordinary tensor and scalar input, per the `bufferArgs`
/// ordering invariant.
pub struct InputBinder<'a> {
    graph: &'a Subgraph,
    symbolic_shape_ids: &'a [i64],
    used_names: HashSet<String>,
}

impl<'a> InputBinder<'a> {
    pub fn new(graph: &'a Subgraph, symbolic_shape_ids: &'a [i64]) -> Self {
        Self {
            graph,
            symbolic_shape_ids,
            used_names: HashSet::new(),
        }
    }

    pub fn bind_all(&mut self, state: &mut KernelState) -> Result<Vec<ComputeTensor>> {
        let mut tensor_names = vec![];
        let mut scalar_names = vec![];
        let mut shape_scalar_names = vec![];
        let mut computes = vec![];

        for (idx, &value_id) in self.graph.graph_inputs.iter().enumerate() {
            let value = self.graph.value(value_id).clone();
            let is_shape_scalar = value.kind == ValueKind::Int
                && shape_symbol_id_for(&value, self.symbolic_shape_ids).is_some();

            match value.kind {
                ValueKind::Tensor => {
                    let (compute, buf_name) = self.bind_tensor_input(state, idx, &value)?;
                    tensor_names.push(buf_name.clone());
                    state.bufs.insert(value.id, buf_name);
                    if let Some(c) = compute {
                        computes.push(c);
                    }
                }
                ValueKind::Float => {
                    let name = self.fresh_name(&value, idx);
                    state.scalars.insert(value.id, name.clone());
                    scalar_names.push(name);
                }
                ValueKind::Bool => {
                    let name = self.fresh_name(&value, idx);
                    state.scalars.insert(value.id, name.clone());
                    scalar_names.push(name);
                }
                ValueKind::Int => {
                    let name = self.fresh_name(&value, idx);
                    state.scalars.insert(value.id, name.clone());
                    if is_shape_scalar {
                        let shape_id = shape_symbol_id_for(&value, self.symbolic_shape_ids).unwrap();
                        state.shapes.bind_input_pos(shape_id, idx);
                        shape_scalar_names.push(name);
                    } else {
                        scalar_names.push(name);
                    }
                }
                ValueKind::None | ValueKind::List => {
                    return Err(KernelError::MalformedInput(format!(
                        "graph input {} has unsupported kind {:?} for direct binding",
                        value.id, value.kind
                    )));
                }
            }
        }

        state.buffer_args.extend(tensor_names);
        state.buffer_args.extend(scalar_names);
        state.buffer_args.extend(shape_scalar_names);
        Ok(computes)
    }

    fn fresh_name(&mut self, value: &Value, idx: usize) -> String {
        let base = value
            .debug_name
            .clone()
            .unwrap_or_else(|| format!("arg{idx}"));
        sanitize_ident(&base, &mut self.used_names)
    }

    fn bind_tensor_input(
        &mut self,
        state: &mut KernelState,
        idx: usize,
        value: &Value,
    ) -> Result<(Option<ComputeTensor>, String)> {
        let dtype = value.scalar_dtype.ok_or_else(|| {
            KernelError::MalformedInput(format!(
                "tensor input {} has no scalar dtype",
                value.id
            ))
        })?;
        let name = self.fresh_name(value, idx);

        if !value.has_complete_type() {
            // Symbolic (incomplete) tensor type: only contiguous layout
            // accepted.
            let shape = value.symbolic_shape.as_ref().ok_or_else(|| {
                KernelError::MissingSymbolicRank(
                    value.debug_name.clone().unwrap_or_else(|| value.id.to_string()),
                )
            })?;
            let dims = state.shapes.sizes_from_symbolic_shape(shape);
            let buf = Buffer::new(name.clone(), dtype, dims);
            state.register_buffer(buf);
            return Ok((None, name));
        }

        let sizes = value.concrete_sizes.clone().unwrap();
        let dims: Vec<ExprHandle> = sizes.iter().map(|&s| ExprHandle::imm_long(s)).collect();

        if value.is_contiguous() {
            let buf = Buffer::new(name.clone(), dtype, dims);
            state.register_buffer(buf);
            return Ok((None, name));
        }

        // Non-contiguous: thin placeholder for raw data, plus a restriding
        // compute tensor that normalizes reads to the logical contiguous
        // shape.
        let placeholder_name = format!("{name}_raw");
        let placeholder = Buffer::new(placeholder_name.clone(), dtype, vec![]);
        state.register_buffer(placeholder);

        let strides = value.concrete_strides.clone().unwrap();
        let compute_name = format!("input_{idx}");
        let axes: Vec<ExprHandle> = (0..sizes.len())
            .map(|d| ExprHandle::var(format!("{compute_name}_ax{d}"), Dtype::Long))
            .collect();
        let mut offset = ExprHandle::imm_long(0);
        for (axis, &stride) in axes.iter().zip(strides.iter()) {
            let term = ExprHandle::binary(BinOp::Mul, axis.clone(), ExprHandle::imm_long(stride));
            offset = ExprHandle::binary(BinOp::Add, offset, term);
        }
        let loaded = ExprHandle::load(placeholder_name, vec![offset]);
        let store = Stmt::Store {
            buf: compute_name.clone(),
            indices: axes.clone(),
            value: loaded,
        };
        let nest = wrap_loops(&axes, &dims, store);
        let buf = Buffer::new(compute_name.clone(), dtype, dims);
        let compute = ComputeTensor::new(buf.clone(), nest);
        state.register_buffer(buf);
        Ok((Some(compute), compute_name))
    }
}

fn wrap_loops(axes: &[ExprHandle], dims: &[ExprHandle], innermost: Stmt) -> Stmt {
    let mut body = innermost;
    for (axis, dim) in axes.iter().zip(dims.iter()).rev() {
        let var = match axis.node() {
            crate::ir::expr::Expr::Var(name, _) => name.clone(),
            _ => unreachable!("axis handles are always Var nodes"),
        };
        body = Stmt::for_loop(var, ExprHandle::imm_long(0), dim.clone(), body);
    }
    body
}

fn shape_symbol_id_for(value: &Value, symbolic_shape_ids: &[i64]) -> Option<i64> {
    // In this model, an Int graph input supplies a dynamic shape symbol when
    // its debug name encodes the symbol id as `ss<|id|>`; a real embedder
    // would instead carry the association explicitly from the graph
    // optimizer. We fall back to positional association against
    // `symbolic_shape_ids` otherwise.
    if let Some(name) = &value.debug_name {
        if let Some(rest) = name.strip_prefix("ss") {
            if let Ok(n) = rest.parse::<i64>() {
                let id = -n;
                if symbolic_shape_ids.contains(&id) {
                    return Some(id);
                }
            }
        }
    }
    None
}
