//! Backend Selector: picks among the simple IR interpreter (fully
//! implemented here), and LLVM/CUDA/Block (external codegen, injected as a
//! trait object since producing real machine code is out of scope for this
//! crate — the dataflow and loop-nest transformation pipeline are its
//! subject, not a code generator backend).

pub mod block;
pub mod cuda;
pub mod interpreter;
pub mod llvm;

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::graph::Device;
use crate::ir::ComputeTensor;
use crate::kernel::state::KernelState;
use crate::stack::EvalStack;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Interpreter,
    Llvm,
    Cuda,
    Block,
}

/// Decision tree: GPU always goes to CUDA; on CPU, `generate_block_code`
/// wins over LLVM; `must_use_llvm_on_cpu` with no LLVM available is fatal
/// rather than silently falling back, since the caller asked for a
/// guarantee; otherwise LLVM is preferred when available, and the
/// interpreter is the final fallback.
pub fn select_backend(device: Device, cfg: &KernelConfig, llvm_available: bool) -> Result<BackendKind> {
    if device == Device::Gpu {
        return Ok(BackendKind::Cuda);
    }
    if cfg.generate_block_code {
        return Ok(BackendKind::Block);
    }
    if cfg.must_use_llvm_on_cpu {
        return if llvm_available {
            Ok(BackendKind::Llvm)
        } else {
            Err(KernelError::BackendUnavailable(
                "must_use_llvm_on_cpu is set but no LLVM codegen is available".into(),
            ))
        };
    }
    if llvm_available {
        return Ok(BackendKind::Llvm);
    }
    Ok(BackendKind::Interpreter)
}

/// The seam external codegen plugs into for LLVM/CUDA/Block. A real
/// embedder supplies a concrete implementation; this crate's own tests use
/// only [`interpreter::Interpreter`], which doesn't need one.
pub trait ExternalCodegen {
    fn compile_and_run(
        &self,
        computes: &[ComputeTensor],
        buffer_args: &[String],
        stack: &EvalStack,
    ) -> std::result::Result<HashMap<String, Vec<f64>>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Executes `computes` under the chosen backend. `codegen` is only
/// consulted for [`BackendKind::Llvm`], [`BackendKind::Cuda`], and
/// [`BackendKind::Block`].
pub fn run(
    kind: BackendKind,
    computes: &[ComputeTensor],
    state: &KernelState,
    stack: &EvalStack,
    codegen: Option<&dyn ExternalCodegen>,
) -> Result<HashMap<String, Vec<f64>>> {
    match kind {
        BackendKind::Interpreter => interpreter::Interpreter::new().execute(computes, state, stack),
        BackendKind::Llvm => {
            let codegen = require_codegen(codegen, "LLVM")?;
            llvm::LlvmBackend::new(codegen).run(computes, &state.buffer_args, stack)
        }
        BackendKind::Cuda => {
            let codegen = require_codegen(codegen, "CUDA")?;
            cuda::CudaBackend::new(codegen).run(computes, &state.buffer_args, stack)
        }
        BackendKind::Block => {
            let codegen = require_codegen(codegen, "Block")?;
            block::BlockBackend::new(codegen).run(computes, &state.buffer_args, stack)
        }
    }
}

fn require_codegen<'a>(codegen: Option<&'a dyn ExternalCodegen>, name: &str) -> Result<&'a dyn ExternalCodegen> {
    codegen.ok_or_else(|| KernelError::BackendUnavailable(format!("{name} backend selected but no codegen was injected")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> KernelConfig {
        KernelConfig::snapshot()
    }

    #[test]
    fn gpu_always_selects_cuda() {
        assert_eq!(select_backend(Device::Gpu, &cfg(), true).unwrap(), BackendKind::Cuda);
    }

    #[test]
    fn block_flag_wins_over_llvm_on_cpu() {
        let mut c = cfg();
        c.generate_block_code = true;
        assert_eq!(select_backend(Device::Cpu, &c, true).unwrap(), BackendKind::Block);
    }

    #[test]
    fn must_use_llvm_without_llvm_available_is_fatal() {
        let mut c = cfg();
        c.must_use_llvm_on_cpu = true;
        let err = select_backend(Device::Cpu, &c, false).unwrap_err();
        assert!(matches!(err, KernelError::BackendUnavailable(_)));
    }

    #[test]
    fn falls_back_to_interpreter_when_nothing_else_applies() {
        let c = cfg();
        assert_eq!(select_backend(Device::Cpu, &c, false).unwrap(), BackendKind::Interpreter);
    }
}
