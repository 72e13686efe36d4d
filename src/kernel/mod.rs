//! The Kernel: compiles a [`crate::graph::Subgraph`] into a runnable
//! pipeline (bind inputs and constants, lower every node, restride outputs,
//! transform the loop nest, select a backend) and exposes `run`/
//! `run_kernel`/`run_fast` over that compiled result.

pub mod state;

use crate::backend::{self, BackendKind, ExternalCodegen};
use crate::binder::constant::ConstantBinder;
use crate::binder::input::InputBinder;
use crate::config::KernelConfig;
use crate::error::Result;
use crate::fallback::FallbackController;
use crate::graph::{Device, Subgraph};
use crate::ir::ComputeTensor;
use crate::lowering::{standard::standard_registry, LoweringDispatcher, Registry};
use crate::restride::restride_output;
use crate::stack::EvalStack;
use state::KernelState;
use std::collections::HashMap;
use tracing::instrument;

pub struct Kernel {
    graph: Subgraph,
    device: Device,
    custom_registry: Registry,
    symbolic_shape_ids: Vec<i64>,
    llvm_available: bool,
    codegen: Option<Box<dyn ExternalCodegen>>,

    state: KernelState,
    computes: Vec<ComputeTensor>,
    backend: BackendKind,
    fallback: FallbackController,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("graph", &self.graph)
            .field("device", &self.device)
            .field("custom_registry", &self.custom_registry)
            .field("symbolic_shape_ids", &self.symbolic_shape_ids)
            .field("llvm_available", &self.llvm_available)
            .field("codegen", &self.codegen.as_ref().map(|_| "<codegen>"))
            .field("state", &self.state)
            .field("computes", &self.computes)
            .field("backend", &self.backend)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl Kernel {
    /// Builds and compiles a kernel in one step; construction-time failure
    /// (e.g. `must_use_llvm_on_cpu` with no LLVM available) is reported
    /// directly instead of deferred to the first `run`.
    #[instrument(skip_all)]
    pub fn new(
        graph: Subgraph,
        device: Device,
        custom_registry: Registry,
        symbolic_shape_ids: Vec<i64>,
        llvm_available: bool,
        codegen: Option<Box<dyn ExternalCodegen>>,
    ) -> Result<Self> {
        let (state, computes, backend, fallback) =
            Self::compile(&graph, device, &custom_registry, &symbolic_shape_ids, llvm_available)?;
        Ok(Self {
            graph,
            device,
            custom_registry,
            symbolic_shape_ids,
            llvm_available,
            codegen,
            state,
            computes,
            backend,
            fallback,
        })
    }

    #[instrument(skip_all)]
    fn compile(
        graph: &Subgraph,
        device: Device,
        custom_registry: &Registry,
        symbolic_shape_ids: &[i64],
        llvm_available: bool,
    ) -> Result<(KernelState, Vec<ComputeTensor>, BackendKind, FallbackController)> {
        let mut state = KernelState::default();

        let mut input_binder = InputBinder::new(graph, symbolic_shape_ids);
        let mut computes = input_binder.bind_all(&mut state)?;

        ConstantBinder::new(graph).bind_all(&mut state)?;

        let standard = standard_registry();
        let dispatcher = LoweringDispatcher::new(graph, custom_registry, &standard, device);
        computes.extend(dispatcher.lower_all(&mut state)?);

        let mut output_names = vec![];
        let mut restrided = vec![];
        for compute in computes {
            let out_value_id = graph
                .graph_outputs
                .iter()
                .find(|&&id| state.bufs.get(&id) == Some(&compute.buf.name));
            if let Some(&id) = out_value_id {
                let value = graph.value(id);
                let restrided_compute = match &value.concrete_strides {
                    Some(declared) => restride_output(compute, declared),
                    None => compute,
                };
                output_names.push(restrided_compute.buf.name.clone());
                state.register_buffer(restrided_compute.buf.clone());
                restrided.push(restrided_compute);
            } else {
                restrided.push(compute);
            }
        }
        state.buf_outputs.extend(output_names.iter().cloned());
        state.buffer_args.extend(output_names.clone());
        let constant_names: Vec<String> = state.constants.iter().map(|c| c.buf_name.clone()).collect();
        state.buffer_args.extend(constant_names);

        let cfg = KernelConfig::snapshot();
        let available_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let out = crate::transform::run(restrided, &output_names, device, &cfg, available_threads);

        let backend = backend::select_backend(device, &cfg, llvm_available)?;
        let fallback = FallbackController::new(&cfg);

        Ok((state, out.computes, backend, fallback))
    }

    /// Re-runs compilation against the kernel's stored graph and current
    /// process-wide configuration, e.g. after a config flag changed.
    pub fn recompile(&mut self) -> Result<()> {
        let (state, computes, backend, fallback) = Self::compile(
            &self.graph,
            self.device,
            &self.custom_registry,
            &self.symbolic_shape_ids,
            self.llvm_available,
        )?;
        self.state = state;
        self.computes = computes;
        self.backend = backend;
        self.fallback = fallback;
        Ok(())
    }

    /// Runs the compiled kernel, falling back to the interpreter on
    /// backend failure when the Fallback Controller allows it.
    #[instrument(skip_all)]
    pub fn run(&self, stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        let codegen = self.codegen.as_deref();
        self.fallback.run_with_fallback(
            || backend::run(self.backend, &self.computes, &self.state, stack, codegen),
            || backend::run(BackendKind::Interpreter, &self.computes, &self.state, stack, None),
        )
    }

    /// Same calling convention as `run`; kept as a distinct entry point so
    /// an embedder's raw-pointer call site can dispatch to it without
    /// going through the typed `run` API's fallback wrapping twice.
    pub fn run_kernel(&self, stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        self.run(stack)
    }

    /// Bypasses the Fallback Controller for the hot path: backend failure
    /// is returned directly instead of retried on the interpreter.
    pub fn run_fast(&self, stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        let codegen = self.codegen.as_deref();
        backend::run(self.backend, &self.computes, &self.state, stack, codegen)
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    pub fn buffer_args(&self) -> &[String] {
        &self.state.buffer_args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Value, ValueKind};
    use crate::ir::Dtype;
    use crate::stack::CallArg;

    fn add_kernel_graph() -> Subgraph {
        let mut graph = Subgraph::default();
        graph.values.push(Value::tensor(0).with_concrete(vec![4], vec![1], Dtype::Float).with_name("a"));
        graph.values.push(Value::tensor(1).with_concrete(vec![4], vec![1], Dtype::Float).with_name("b"));
        graph.values.push(Value::tensor(2).with_concrete(vec![4], vec![1], Dtype::Float).with_name("out"));
        graph.graph_inputs.extend([0, 1]);
        graph.graph_outputs.push(2);
        graph.nodes.push(Node {
            kind: "aten::add".into(),
            schema: "aten::add".into(),
            inputs: vec![0, 1],
            outputs: vec![2],
            constant_value: None,
        });
        graph
    }

    #[test]
    fn compiles_and_runs_elementwise_add() {
        let graph = add_kernel_graph();
        let kernel = Kernel::new(graph, Device::Cpu, Registry::new(), vec![], false, None).unwrap();
        // buffer_args is [a, b, add_out]: the caller pre-allocates the
        // output buffer too, per the bufferArgs ordering invariant.
        let stack = EvalStack::new(vec![
            CallArg::Buffer(vec![1.0, 1.0, 1.0, 1.0]),
            CallArg::Buffer(vec![1.0, 1.0, 1.0, 1.0]),
            CallArg::Buffer(vec![0.0, 0.0, 0.0, 0.0]),
        ]);
        let outputs = kernel.run(&stack).unwrap();
        let out_name = kernel.buffer_args().last().unwrap();
        assert_eq!(outputs[out_name], vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn graph_without_matching_value_kind_fails_cleanly() {
        let mut graph = Subgraph::default();
        graph.values.push(Value::scalar(0, ValueKind::None, Dtype::Float));
        graph.graph_inputs.push(0);
        let err = Kernel::new(graph, Device::Cpu, Registry::new(), vec![], false, None).unwrap_err();
        assert!(matches!(err, crate::error::KernelError::MalformedInput(_)));
    }
}
