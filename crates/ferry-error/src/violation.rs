/// Misuse of the error channel. Every variant is a programming error in the
/// caller, never an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("read the value of a failed outcome (failure#{failure})")]
    ValueOfFailure { failure: u64 },

    #[error("read the failure id of a successful outcome")]
    FailureIdOfSuccess,

    #[error("propagated a successful outcome as a failure")]
    PropagateSuccess,

    #[error(
        "slot for `{type_name}` released out of order: handle #{released} is not the innermost (expected #{expected})"
    )]
    ReleaseOutOfOrder {
        type_name: &'static str,
        released: u64,
        expected: u64,
    },

    #[error("slot for `{type_name}` released without any outstanding registration")]
    ReleaseWithoutRegistration { type_name: &'static str },

    #[error("slot handle for `{type_name}` belongs to channel #{owner}, released on channel #{channel}")]
    ForeignHandle {
        type_name: &'static str,
        owner: u64,
        channel: u64,
    },

    #[error("no handler in a terminal handling scope matched failure#{failure}")]
    Unhandled { failure: u64 },

    #[error("failure ids exhausted on channel #{channel}")]
    IdsExhausted { channel: u64 },
}

impl ContractViolation {
    /// Short machine-readable tag, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            ContractViolation::ValueOfFailure { .. } => "value_of_failure",
            ContractViolation::FailureIdOfSuccess => "failure_id_of_success",
            ContractViolation::PropagateSuccess => "propagate_success",
            ContractViolation::ReleaseOutOfOrder { .. } => "release_out_of_order",
            ContractViolation::ReleaseWithoutRegistration { .. } => "release_without_registration",
            ContractViolation::ForeignHandle { .. } => "foreign_handle",
            ContractViolation::Unhandled { .. } => "unhandled",
            ContractViolation::IdsExhausted { .. } => "ids_exhausted",
        }
    }
}
