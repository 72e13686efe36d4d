//! "Block" backend: a vectorized-codegen target with its own per-dtype lane
//! width (32 for `Byte`-width data, 16 otherwise; see
//! [`crate::transform::block_backend_block_size`]). Selected when
//! `generate_block_code` is set, taking priority over LLVM on CPU.

use crate::error::{KernelError, Result};
use crate::ir::ComputeTensor;
use crate::stack::EvalStack;
use std::collections::HashMap;

pub struct BlockBackend<'a> {
    codegen: &'a dyn super::ExternalCodegen,
}

impl<'a> BlockBackend<'a> {
    pub fn new(codegen: &'a dyn super::ExternalCodegen) -> Self {
        Self { codegen }
    }

    pub fn run(&self, computes: &[ComputeTensor], buffer_args: &[String], stack: &EvalStack) -> Result<HashMap<String, Vec<f64>>> {
        self.codegen
            .compile_and_run(computes, buffer_args, stack)
            .map_err(|e| KernelError::Backend(e))
    }
}
