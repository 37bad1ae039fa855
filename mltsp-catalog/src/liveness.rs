//! OS-level process liveness probe.
//!
//! A pid counts as live when signal 0 can be delivered to it, or when the
//! kernel refuses with `EPERM` (the process exists but belongs to someone
//! else). Every other outcome, including a malformed or out-of-range pid,
//! reads as "not running".

use mltsp_core::{JobStatus, ProbeError};

/// Checks whether a process id is currently live.
pub trait LivenessProbe: Send + Sync {
    fn probe(&self, pid: i64) -> Result<bool, ProbeError>;
}

/// Probe using `kill(pid, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl LivenessProbe for SignalProbe {
    #[cfg(unix)]
    fn probe(&self, pid: i64) -> Result<bool, ProbeError> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // 0 and negatives address process groups, not a single process.
        if pid <= 0 {
            return Err(ProbeError::OutOfRange { pid });
        }
        let raw = i32::try_from(pid).map_err(|_| ProbeError::OutOfRange { pid })?;

        match kill(Pid::from_raw(raw), None) {
            Ok(()) => Ok(true),
            Err(Errno::EPERM) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(errno) => Err(ProbeError::Os {
                pid,
                reason: errno.to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn probe(&self, _pid: i64) -> Result<bool, ProbeError> {
        Err(ProbeError::Unsupported)
    }
}

/// Parse a pid as stored (always a decimal string).
pub fn parse_pid(value: &str) -> Result<i64, ProbeError> {
    value.trim().parse::<i64>().map_err(|_| ProbeError::Malformed {
        value: value.to_string(),
    })
}

/// Run a probe, folding failures into "not running".
pub fn probe_or_dead(probe: &dyn LivenessProbe, pid: i64) -> bool {
    match probe.probe(pid) {
        Ok(alive) => alive,
        Err(e) => {
            tracing::debug!(pid, error = %e, "Liveness probe failed; treating as not running");
            false
        }
    }
}

/// Whether `pid` names a live process.
pub fn is_running(pid: i64) -> bool {
    probe_or_dead(&SignalProbe, pid)
}

/// `CurrentlyRunning` iff [`is_running`], otherwise `Finished`.
pub fn job_status(pid: i64) -> JobStatus {
    JobStatus::from_liveness(is_running(pid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_is_running() {
        assert!(is_running(std::process::id() as i64));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_init_is_running() {
        assert!(is_running(1));
        assert_eq!(job_status(1), JobStatus::CurrentlyRunning);
    }

    #[test]
    fn test_unused_pid_is_not_running() {
        assert!(!is_running(99999));
        assert_eq!(job_status(99999), JobStatus::Finished);
    }

    #[test]
    fn test_job_status_matches_liveness() {
        for pid in [std::process::id() as i64, 99999, 0, -1] {
            let expected = if is_running(pid) {
                JobStatus::CurrentlyRunning
            } else {
                JobStatus::Finished
            };
            assert_eq!(job_status(pid), expected);
        }
    }

    #[test]
    fn test_out_of_range_pids_are_not_running() {
        assert!(!is_running(0));
        assert!(!is_running(-1));
        assert!(!is_running(i64::MAX));
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("9999").unwrap(), 9999);
        assert_eq!(parse_pid(" 42 ").unwrap(), 42);
        assert!(matches!(
            parse_pid("abc"),
            Err(ProbeError::Malformed { .. })
        ));
    }

    struct FailingProbe;

    impl LivenessProbe for FailingProbe {
        fn probe(&self, pid: i64) -> Result<bool, ProbeError> {
            Err(ProbeError::Os {
                pid,
                reason: "EINVAL".to_string(),
            })
        }
    }

    #[test]
    fn test_probe_failure_reads_as_dead() {
        assert!(!probe_or_dead(&FailingProbe, 1));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_malformed_pid_strings_rejected(s in "[a-z]{1,8}") {
            prop_assert!(parse_pid(&s).is_err());
        }

        #[test]
        fn prop_decimal_pid_strings_parse(pid in 1i64..i64::MAX) {
            prop_assert_eq!(parse_pid(&pid.to_string()).unwrap(), pid);
        }
    }
}
