//! Fallback Controller: decides, at construction time, whether a failed
//! primary backend run may fall back to the interpreter, and enforces that
//! decision at call time.

use crate::config::{fallback_env, FallbackEnv, KernelConfig};
use crate::error::{KernelError, Result};

#[derive(Debug)]
pub struct FallbackController {
    allowed: bool,
}

impl FallbackController {
    /// `FALLBACK=0` forces fallback off regardless of configuration;
    /// `FALLBACK=2` forces it on; otherwise `cfg.fallback_allowed` governs.
    pub fn new(cfg: &KernelConfig) -> Self {
        let allowed = match fallback_env() {
            FallbackEnv::ForceOff => false,
            FallbackEnv::Enforced => true,
            FallbackEnv::Unset => cfg.fallback_allowed,
        };
        Self { allowed }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// Runs `primary`; on failure, runs `fallback` only if allowed,
    /// reporting both errors together if it also fails.
    pub fn run_with_fallback<T>(
        &self,
        primary: impl FnOnce() -> Result<T>,
        fallback: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        match primary() {
            Ok(v) => Ok(v),
            Err(primary_err) if self.allowed => fallback().map_err(|fallback_err| {
                KernelError::FallbackFailed(format!(
                    "primary backend failed ({primary_err}), fallback also failed: {fallback_err}"
                ))
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        std::env::remove_var("FALLBACK");
    }

    #[test]
    fn enforced_env_overrides_disallowing_config() {
        let _guard = LOCK.lock().unwrap();
        std::env::set_var("FALLBACK", "2");
        let mut cfg = KernelConfig::snapshot();
        cfg.fallback_allowed = false;
        assert!(FallbackController::new(&cfg).allowed());
        clear_env();
    }

    #[test]
    fn force_off_env_overrides_allowing_config() {
        let _guard = LOCK.lock().unwrap();
        std::env::set_var("FALLBACK", "0");
        let mut cfg = KernelConfig::snapshot();
        cfg.fallback_allowed = true;
        assert!(!FallbackController::new(&cfg).allowed());
        clear_env();
    }

    #[test]
    fn falls_back_on_primary_failure_when_allowed() {
        let _guard = LOCK.lock().unwrap();
        clear_env();
        let mut cfg = KernelConfig::snapshot();
        cfg.fallback_allowed = true;
        let controller = FallbackController::new(&cfg);
        let result = controller.run_with_fallback(
            || Err::<i32, _>(KernelError::BackendUnavailable("boom".into())),
            || Ok(7),
        );
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn propagates_primary_error_when_fallback_disallowed() {
        let _guard = LOCK.lock().unwrap();
        clear_env();
        let mut cfg = KernelConfig::snapshot();
        cfg.fallback_allowed = false;
        let controller = FallbackController::new(&cfg);
        let result = controller.run_with_fallback(
            || Err::<i32, _>(KernelError::BackendUnavailable("boom".into())),
            || Ok(7),
        );
        assert!(matches!(result.unwrap_err(), KernelError::BackendUnavailable(_)));
    }
}
