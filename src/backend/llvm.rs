//! LLVM backend: codegen internals are an external collaborator's concern.
//! This module only carries the structural decision of whether LLVM is the
//! chosen backend and dispatches to an injected [`super::ExternalCodegen`].

use crate::error::{KernelError, Result};
use crate::ir::ComputeTensor;
use crate::stack::EvalStack;
use std::collections::HashMap;

pub struct LlvmBackend<'a> {
    codegen: &'a dyn super::ExternalCodegen,
}

impl<'a> LlvmBackend<'a> {
    pub fn new(codegen: &'a dyn super::ExternalCodegen) -> Self {
        Self { codegen }
    }

    pub fn run(&self, computes: &[ComputeTensor], buffer_args: &[String], stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        self.codegen
            .compile_and_run(computes, buffer_args, stack)
            .map_err(|e| KernelError::Backend(e))
    }
}
