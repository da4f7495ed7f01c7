//! Pre-flight checks for timertop
//!
//! Validates privileges and tracer availability before any tracing resource
//! is allocated, so failures surface as one clear message instead of a
//! half-configured instance.

#![allow(unsafe_code)] // geteuid() and sysconf() require unsafe

use std::path::Path;

use crate::domain::SetupError;

/// Controlling the timerlat tracer requires root.
pub fn check_privileges() -> Result<(), SetupError> {
    if unsafe { libc::geteuid() } == 0 {
        Ok(())
    } else {
        Err(SetupError::Privilege)
    }
}

/// Check that tracefs is mounted at `root` and the kernel ships the
/// timerlat tracer.
pub fn check_tracefs(root: impl AsRef<Path>) -> Result<(), SetupError> {
    let tracers = root.as_ref().join("available_tracers");
    let Ok(available) = std::fs::read_to_string(&tracers) else {
        return Err(SetupError::TracefsMissing(root.as_ref().to_path_buf()));
    };
    if available.split_whitespace().any(|t| t == "timerlat") {
        Ok(())
    } else {
        Err(SetupError::TracerUnsupported)
    }
}

/// CPU count as configured at boot. Fixed for the run's lifetime; CPUs that
/// hot-plug in later are out of scope and ignored by the event source.
#[must_use]
pub fn nr_cpus() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    usize::try_from(n).unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_nr_cpus_is_positive() {
        assert!(nr_cpus() >= 1);
    }

    #[test]
    fn test_tracefs_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_tracefs(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SetupError::TracefsMissing(_)));
    }

    #[test]
    fn test_timerlat_not_in_available_tracers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("available_tracers"), "osnoise wakeup nop\n").unwrap();
        let err = check_tracefs(dir.path()).unwrap_err();
        assert!(matches!(err, SetupError::TracerUnsupported));
    }

    #[test]
    fn test_timerlat_available() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("available_tracers"),
            "timerlat osnoise wakeup nop\n",
        )
        .unwrap();
        assert!(check_tracefs(dir.path()).is_ok());
    }
}
