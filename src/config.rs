//! Process-wide configuration flags.
//!
//! Readers and writers are expected to coordinate externally — these are
//! plain atomics, not guarded by a lock, matching a "no internal locking"
//! resource model.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

static CUDA_POINTWISE_LOOP_LEVELS: AtomicI64 = AtomicI64::new(0);
static CUDA_POINTWISE_BLOCK_COUNT: AtomicI64 = AtomicI64::new(0);
static CUDA_POINTWISE_BLOCK_SIZE: AtomicI64 = AtomicI64::new(0);
static GENERATE_BLOCK_CODE: AtomicBool = AtomicBool::new(false);
static MUST_USE_LLVM_ON_CPU: AtomicBool = AtomicBool::new(false);
static CAT_WITHOUT_CONDITIONALS: AtomicBool = AtomicBool::new(false);
static OPTIMIZE_CONDITIONALS: AtomicBool = AtomicBool::new(false);
static FALLBACK_ALLOWED: AtomicBool = AtomicBool::new(true);

/// An immutable snapshot of process-wide flags, taken once per [`crate::kernel::Kernel::new`]
/// so a single compilation observes a consistent view of configuration even
/// if another thread mutates the globals mid-compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub cuda_pointwise_loop_levels: i64,
    pub cuda_pointwise_block_count: i64,
    pub cuda_pointwise_block_size: i64,
    pub generate_block_code: bool,
    pub must_use_llvm_on_cpu: bool,
    pub cat_without_conditionals: bool,
    pub optimize_conditionals: bool,
    pub fallback_allowed: bool,
}

impl KernelConfig {
    pub fn snapshot() -> Self {
        Self {
            cuda_pointwise_loop_levels: cuda_pointwise_loop_levels(),
            cuda_pointwise_block_count: cuda_pointwise_block_count(),
            cuda_pointwise_block_size: cuda_pointwise_block_size(),
            generate_block_code: generate_block_code(),
            must_use_llvm_on_cpu: must_use_llvm_on_cpu(),
            cat_without_conditionals: cat_without_conditionals(),
            optimize_conditionals: optimize_conditionals(),
            fallback_allowed: fallback_allowed(),
        }
    }

    /// Resolved CUDA loop level: 2 or 3, defaulting to 2 when unset (<= 0).
    pub fn loop_level(&self) -> i64 {
        if self.cuda_pointwise_loop_levels <= 0 {
            2
        } else {
            self.cuda_pointwise_loop_levels
        }
    }

    /// Resolved CUDA block count, only meaningful for the 3-level mapping.
    pub fn block_count(&self) -> i64 {
        if self.cuda_pointwise_block_count <= 0 {
            1280
        } else {
            self.cuda_pointwise_block_count
        }
    }

    /// Resolved CUDA block size: default depends on loop level (512 for
    /// 2-level, 256 for 3-level).
    pub fn block_size(&self) -> i64 {
        if self.cuda_pointwise_block_size > 0 {
            return self.cuda_pointwise_block_size;
        }
        match self.loop_level() {
            3 => 256,
            _ => 512,
        }
    }
}

pub fn cuda_pointwise_loop_levels() -> i64 {
    CUDA_POINTWISE_LOOP_LEVELS.load(Ordering::Relaxed)
}
pub fn set_cuda_pointwise_loop_levels(v: i64) {
    CUDA_POINTWISE_LOOP_LEVELS.store(v, Ordering::Relaxed);
}

pub fn cuda_pointwise_block_count() -> i64 {
    CUDA_POINTWISE_BLOCK_COUNT.load(Ordering::Relaxed)
}
pub fn set_cuda_pointwise_block_count(v: i64) {
    CUDA_POINTWISE_BLOCK_COUNT.store(v, Ordering::Relaxed);
}

pub fn cuda_pointwise_block_size() -> i64 {
    CUDA_POINTWISE_BLOCK_SIZE.load(Ordering::Relaxed)
}
pub fn set_cuda_pointwise_block_size(v: i64) {
    CUDA_POINTWISE_BLOCK_SIZE.store(v, Ordering::Relaxed);
}

pub fn generate_block_code() -> bool {
    GENERATE_BLOCK_CODE.load(Ordering::Relaxed)
}
pub fn set_generate_block_code(v: bool) {
    GENERATE_BLOCK_CODE.store(v, Ordering::Relaxed);
}

pub fn must_use_llvm_on_cpu() -> bool {
    MUST_USE_LLVM_ON_CPU.load(Ordering::Relaxed)
}
pub fn set_must_use_llvm_on_cpu(v: bool) {
    MUST_USE_LLVM_ON_CPU.store(v, Ordering::Relaxed);
}

pub fn cat_without_conditionals() -> bool {
    CAT_WITHOUT_CONDITIONALS.load(Ordering::Relaxed)
}
pub fn set_cat_without_conditionals(v: bool) {
    CAT_WITHOUT_CONDITIONALS.store(v, Ordering::Relaxed);
}

pub fn optimize_conditionals() -> bool {
    OPTIMIZE_CONDITIONALS.load(Ordering::Relaxed)
}
pub fn set_optimize_conditionals(v: bool) {
    OPTIMIZE_CONDITIONALS.store(v, Ordering::Relaxed);
}

pub fn fallback_allowed() -> bool {
    FALLBACK_ALLOWED.load(Ordering::Relaxed)
}
pub fn set_fallback_allowed(v: bool) {
    FALLBACK_ALLOWED.store(v, Ordering::Relaxed);
}

/// `FALLBACK` env var: `"0"` forces fallback off, `"2"` forces fallback
/// enforced, unset follows `fallback_allowed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEnv {
    Unset,
    ForceOff,
    Enforced,
}

pub fn fallback_env() -> FallbackEnv {
    match std::env::var("FALLBACK").as_deref() {
        Ok("0") => FallbackEnv::ForceOff,
        Ok("2") => FallbackEnv::Enforced,
        _ => FallbackEnv::Unset,
    }
}

/// `DONT_USE_LLVM=1` forces the simple IR interpreter on CPU.
pub fn dont_use_llvm() -> bool {
    std::env::var("DONT_USE_LLVM").as_deref() == Ok("1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Global atomics are process-wide; serialize the tests that touch them.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn resolves_cuda_loop_level_default() {
        let _guard = LOCK.lock().unwrap();
        set_cuda_pointwise_loop_levels(0);
        let cfg = KernelConfig::snapshot();
        assert_eq!(cfg.loop_level(), 2);
        set_cuda_pointwise_loop_levels(3);
        let cfg = KernelConfig::snapshot();
        assert_eq!(cfg.loop_level(), 3);
        set_cuda_pointwise_loop_levels(0);
    }

    #[test]
    fn resolves_block_size_by_level() {
        let _guard = LOCK.lock().unwrap();
        set_cuda_pointwise_block_size(0);
        set_cuda_pointwise_loop_levels(2);
        assert_eq!(KernelConfig::snapshot().block_size(), 512);
        set_cuda_pointwise_loop_levels(3);
        assert_eq!(KernelConfig::snapshot().block_size(), 256);
        set_cuda_pointwise_loop_levels(0);
    }
}
