use ferry_error::{ContractViolation, ViolationPolicy};

use crate::FailureId;

/// Result of a fallible operation: either a value or the id of the failure.
///
/// An `Outcome` never carries error detail itself. Detail travels through the
/// [`ErrorChannel`](crate::ErrorChannel) keyed by the [`FailureId`], so a failed
/// `Outcome<T>` relays as a failed `Outcome<U>` without naming any error type.
///
/// Reading the wrong side ([`value`](Self::value) of a failure,
/// [`failure_id`](Self::failure_id) of a success) is a contract violation and
/// panics.
#[must_use = "an Outcome may carry a failure that must be handled or relayed"]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Outcome<T> {
    inner: Result<T, FailureId>,
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome { inner: Ok(value) }
    }

    pub fn failure(id: FailureId) -> Self {
        Outcome { inner: Err(id) }
    }

    pub fn is_success(&self) -> bool {
        self.inner.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.inner.is_err()
    }

    /// Borrow the success value.
    #[track_caller]
    pub fn value(&self) -> &T {
        match &self.inner {
            Ok(value) => value,
            Err(id) => ViolationPolicy::Panic.enforce(ContractViolation::ValueOfFailure {
                failure: id.get(),
            }),
        }
    }

    #[track_caller]
    pub fn into_value(self) -> T {
        match self.inner {
            Ok(value) => value,
            Err(id) => ViolationPolicy::Panic.enforce(ContractViolation::ValueOfFailure {
                failure: id.get(),
            }),
        }
    }

    #[track_caller]
    pub fn failure_id(&self) -> FailureId {
        match &self.inner {
            Ok(_) => ViolationPolicy::Panic.enforce(ContractViolation::FailureIdOfSuccess),
            Err(id) => *id,
        }
    }

    /// The failure id, or `None` on success.
    pub fn try_failure_id(&self) -> Option<FailureId> {
        self.inner.as_ref().err().copied()
    }

    /// Re-type a failed outcome, keeping its id. The value type plays no part,
    /// which is what lets intermediate callers relay failures they know
    /// nothing about.
    #[track_caller]
    pub fn propagate<U>(self) -> Outcome<U> {
        match self.inner {
            Ok(_) => ViolationPolicy::Panic.enforce(ContractViolation::PropagateSuccess),
            Err(id) => Outcome::failure(id),
        }
    }

    pub fn into_result(self) -> Result<T, FailureId> {
        self.inner
    }

    pub fn ok(self) -> Option<T> {
        self.inner.ok()
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        Outcome {
            inner: self.inner.as_ref().map_err(|id| *id),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            inner: self.inner.map(f),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self.inner {
            Ok(value) => f(value),
            Err(id) => Outcome::failure(id),
        }
    }
}

impl<T> From<Result<T, FailureId>> for Outcome<T> {
    fn from(inner: Result<T, FailureId>) -> Self {
        Outcome { inner }
    }
}

impl<T> From<Outcome<T>> for Result<T, FailureId> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.inner
    }
}

impl<T> From<FailureId> for Outcome<T> {
    fn from(id: FailureId) -> Self {
        Outcome::failure(id)
    }
}
