//! CUDA backend: same opaque-codegen shape as [`super::llvm`], dispatched
//! after [`crate::transform::gpu_split`] has already flattened and split
//! the loop nest into block/thread axes.

use crate::error::{KernelError, Result};
use crate::ir::ComputeTensor;
use crate::stack::EvalStack;
use std::collections::HashMap;

pub struct CudaBackend<'a> {
    codegen: &'a dyn super::ExternalCodegen,
}

impl<'a> CudaBackend<'a> {
    pub fn new(codegen: &'a dyn super::ExternalCodegen) -> Self {
        Self { codegen }
    }

    pub fn run(&self, computes: &[ComputeTensor], buffer_args: &[String], stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        self.codegen
            .compile_and_run(computes, buffer_args, stack)
            .map_err(|e| KernelError::Backend(e))
    }
}
