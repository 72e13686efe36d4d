use super::sanitize_ident;
use crate::error::Result;
use crate::graph::{ConstantPayload, Node, Subgraph};
use crate::ir::{default_contiguous_strides, Buffer, Dtype};
use crate::kernel::state::{ConstantBinding, KernelState};
use std::collections::HashSet;

/// Materializes every `Constant` node's tensor/opaque payload into a buffer
/// and raw pointer. Scalar constants are *not* bound
/// here — lowerings embed them as immediates straight from the graph value,
/// via [`crate::arg::to_arg`].
pub struct ConstantBinder<'a> {
    graph: &'a Subgraph,
    used_names: HashSet<String>,
}

impl<'a> ConstantBinder<'a> {
    pub fn new(graph: &'a Subgraph) -> Self {
        Self {
            graph,
            used_names: HashSet::new(),
        }
    }

    pub fn bind_all(&mut self, state: &mut KernelState) -> Result<()> {
        for node in &self.graph.nodes {
            if node.kind != "Constant" {
                continue;
            }
            let Some(payload) = &node.constant_value else {
                continue;
            };
            let Some(&out) = node.outputs.first() else {
                continue;
            };
            self.bind_one(state, node, out, payload)?;
        }
        Ok(())
    }

    fn bind_one(
        &mut self,
        state: &mut KernelState,
        node: &Node,
        out: usize,
        payload: &ConstantPayload,
    ) -> Result<()> {
        match payload {
            ConstantPayload::Int(_)
            | ConstantPayload::Double(_)
            | ConstantPayload::Bool(_)
            | ConstantPayload::IntList(_)
            | ConstantPayload::DoubleList(_) => Ok(()),

            ConstantPayload::CustomClass => {
                let name = sanitize_ident(&format!("const{out}"), &mut self.used_names);
                let buf = Buffer::new(name.clone(), Dtype::Float, vec![]);
                state.register_buffer(buf);
                state.bufs.insert(out, name.clone());
                state.constants.push(ConstantBinding {
                    buf_name: name,
                    data_ptr: None,
                    byte_len: 0,
                });
                let _ = node; // node carried for backend resolution in a real embedder
                Ok(())
            }

            ConstantPayload::Tensor {
                data,
                dtype,
                sizes,
                strides,
            } => {
                let name = sanitize_ident(&format!("const{out}"), &mut self.used_names);
                let contiguous = *strides == default_contiguous_strides(sizes);
                let bytes = if contiguous {
                    data.clone()
                } else {
                    clone_contiguous(data, *dtype, sizes, strides)
                };
                let dims = sizes.iter().map(|&s| crate::ir::ExprHandle::imm_long(s)).collect();
                let buf = Buffer::new(name.clone(), *dtype, dims);
                state.register_buffer(buf);
                state.bufs.insert(out, name.clone());
                let ptr = bytes.as_ptr();
                let len = bytes.len();
                state.unpacked_constant_tensors.push(bytes);
                state.constants.push(ConstantBinding {
                    buf_name: name,
                    data_ptr: Some(ptr),
                    byte_len: len,
                });
                Ok(())
            }
        }
    }
}

/// Clones a strided tensor's raw bytes into row-major contiguous order.
fn clone_contiguous(data: &[u8], dtype: Dtype, sizes: &[i64], strides: &[i64]) -> Vec<u8> {
    let elem_size = match dtype {
        Dtype::Bool => 1,
        Dtype::Long => 8,
        Dtype::Double => 8,
        Dtype::Float => 4,
    };
    let count: i64 = sizes.iter().product();
    let mut out = vec![0u8; (count as usize) * elem_size];
    let mut index = vec![0i64; sizes.len()];
    for linear in 0..count {
        let mut remaining = linear;
        for d in (0..sizes.len()).rev() {
            let dim = sizes[d].max(1);
            index[d] = remaining % dim;
            remaining /= dim;
        }
        let src_offset: i64 = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
        let src_start = (src_offset as usize) * elem_size;
        let dst_start = (linear as usize) * elem_size;
        out[dst_start..dst_start + elem_size]
            .copy_from_slice(&data[src_start..src_start + elem_size]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn custom_class_constant_gets_zero_dim_float_buffer() {
        let mut graph = Subgraph::default();
        graph.nodes.push(Node {
            kind: "Constant".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![0],
            constant_value: Some(ConstantPayload::CustomClass),
        });
        let mut state = KernelState::default();
        ConstantBinder::new(&graph).bind_all(&mut state).unwrap();
        let name = state.bufs.get(&0).unwrap();
        let buf = state.buffers.get(name).unwrap();
        assert_eq!(buf.rank(), 0);
        assert_eq!(buf.dtype, Dtype::Float);
        assert!(state.constants[0].data_ptr.is_none());
    }

    #[test]
    fn contiguous_tensor_constant_keeps_its_bytes() {
        let mut graph = Subgraph::default();
        let data = vec![0u8; 4 * 4];
        graph.nodes.push(Node {
            kind: "Constant".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![0],
            constant_value: Some(ConstantPayload::Tensor {
                data,
                dtype: Dtype::Float,
                sizes: vec![4],
                strides: vec![1],
            }),
        });
        let mut state = KernelState::default();
        ConstantBinder::new(&graph).bind_all(&mut state).unwrap();
        assert_eq!(state.unpacked_constant_tensors.len(), 1);
        assert_eq!(state.constants.len(), 1);
        assert!(state.constants[0].data_ptr.is_some());
    }

    #[test]
    fn non_contiguous_tensor_constant_is_cloned_contiguous() {
        let mut graph = Subgraph::default();
        // 2x2 tensor stored column-major (strides [1,2]) of u32-coded floats.
        let mut data = vec![0u8; 4 * 4];
        for (i, chunk) in data.chunks_mut(4).enumerate() {
            chunk.copy_from_slice(&(i as f32).to_ne_bytes());
        }
        graph.nodes.push(Node {
            kind: "Constant".into(),
            schema: String::new(),
            inputs: vec![],
            outputs: vec![0],
            constant_value: Some(ConstantPayload::Tensor {
                data,
                dtype: Dtype::Float,
                sizes: vec![2, 2],
                strides: vec![1, 2],
            }),
        });
        let mut state = KernelState::default();
        ConstantBinder::new(&graph).bind_all(&mut state).unwrap();
        let cloned = &state.unpacked_constant_tensors[0];
        let v0 = f32::from_ne_bytes(cloned[0..4].try_into().unwrap());
        let v1 = f32::from_ne_bytes(cloned[4..8].try_into().unwrap());
        // logical (0,0) -> source offset 0*1+0*2=0, logical (0,1) -> offset 0*1+1*2=2
        assert_eq!(v0, 0.0);
        assert_eq!(v1, 2.0);
    }
}
