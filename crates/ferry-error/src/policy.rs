//! What happens when a contract violation is detected.
//!
//! Violations are never tolerated: every policy reports the violation through
//! `tracing` and then ends the current thread of control. The policies differ
//! only in how hard they end it.
//!
//! Example
//! ```rust
//! use ferry_error::ViolationPolicy;
//!
//! let policy: ViolationPolicy = "abort".parse().unwrap();
//! assert_eq!(policy, ViolationPolicy::Abort);
//! ```
use std::fmt;
use std::str::FromStr;

use super::ContractViolation;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViolationPolicy {
    /// Panic with the violation's message. Unwinding still runs every
    /// scope guard on the way out.
    #[default]
    Panic,
    /// Abort the process immediately after logging.
    Abort,
}

impl ViolationPolicy {
    /// Report `violation` and end the current thread of control.
    #[cold]
    #[track_caller]
    pub fn enforce(self, violation: ContractViolation) -> ! {
        let location = std::panic::Location::caller();
        tracing::error!(
            kind = violation.kind(),
            %violation,
            %location,
            policy = %self,
            "error channel contract violated"
        );
        match self {
            ViolationPolicy::Panic => panic!("{violation}"),
            ViolationPolicy::Abort => std::process::abort(),
        }
    }
}

impl fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationPolicy::Panic => f.write_str("panic"),
            ViolationPolicy::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown violation policy `{value}` (expected `panic` or `abort`)")]
    UnknownViolationPolicy { value: String },
}

impl FromStr for ViolationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(ViolationPolicy::Panic),
            "abort" => Ok(ViolationPolicy::Abort),
            _ => Err(ConfigError::UnknownViolationPolicy {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" Panic ".parse::<ViolationPolicy>(), Ok(ViolationPolicy::Panic));
        assert_eq!("ABORT".parse::<ViolationPolicy>(), Ok(ViolationPolicy::Abort));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = "ignore".parse::<ViolationPolicy>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownViolationPolicy {
                value: "ignore".into()
            }
        );
    }

    #[test]
    #[should_panic(expected = "no handler in a terminal handling scope matched failure#3")]
    fn panic_policy_panics_with_violation_text() {
        let _ = tracing_subscriber::fmt::try_init();
        ViolationPolicy::Panic.enforce(ContractViolation::Unhandled { failure: 3 });
    }
}
