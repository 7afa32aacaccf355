//! Handling scopes: declare interest, run an attempt, resolve a handler.
use itertools::Itertools;
use tracing::{debug, error, trace};

use ferry_error::ContractViolation;

use crate::channel::SlotHandle;
use crate::handler::{Fetched, Handler, dispatch};
use crate::{ErrorChannel, FailureId, Outcome};

/// Slot registrations of one handling scope. Dropping the frame releases them
/// innermost-first on every exit path, unwinding included.
struct ScopeFrame<'c> {
    channel: &'c ErrorChannel,
    handles: Vec<SlotHandle>,
    unhandled: Option<FailureId>,
}

impl<'c> ScopeFrame<'c> {
    fn enter<R>(channel: &'c ErrorChannel, handlers: &[Handler<'_, R>]) -> Self {
        let handles: Vec<_> = handlers
            .iter()
            .flat_map(|handler| handler.required_types())
            .unique_by(|(ty, _)| *ty)
            .map(|(ty, type_name)| channel.register_raw(ty, type_name))
            .collect();
        trace!(slots = handles.len(), depth = channel.depth(), "handling scope entered");
        ScopeFrame {
            channel,
            handles,
            unhandled: None,
        }
    }

    fn take(&self, id: FailureId) -> Fetched {
        self.channel.take_for(&self.handles, id)
    }

    /// Give the objects back to the slots and mark them for re-offering to
    /// outer scopes when the frame is released.
    fn propagate(&mut self, fetched: Fetched) {
        self.unhandled = Some(fetched.id());
        self.channel.restore(&self.handles, fetched);
    }
}

impl Drop for ScopeFrame<'_> {
    fn drop(&mut self) {
        while let Some(handle) = self.handles.pop() {
            if let Err(violation) = self.channel.pop_slot(&handle, self.unhandled) {
                if std::thread::panicking() {
                    error!(%violation, "slot release failed while unwinding");
                } else {
                    self.channel.violated(violation);
                }
            }
        }
    }
}

impl ErrorChannel {
    /// Run `attempt` inside a handling scope.
    ///
    /// Before the attempt runs, a slot is registered for every diagnostic type
    /// any handler mentions. On failure the handlers are tried in order against
    /// the objects deposited for that failure and the first satisfiable one
    /// produces the result. If none is satisfiable the original failure is
    /// returned unchanged, and its objects are re-offered to enclosing scopes.
    ///
    /// ```rust
    /// use ferry::{ErrorChannel, Handler, Outcome};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum Io { Missing, Denied }
    ///
    /// let ch = ErrorChannel::new();
    /// let got = ch.try_handle_some(
    ///     || -> Outcome<&'static str> { ch.new_error((Io::Denied,)) },
    ///     [
    ///         Handler::new(|_: &Io| "missing").matching([Io::Missing]),
    ///         Handler::new(|_: &Io| "other io"),
    ///     ],
    /// );
    /// assert_eq!(got.into_value(), "other io");
    /// ```
    pub fn try_handle_some<'h, T, F, I>(&self, attempt: F, handlers: I) -> Outcome<T>
    where
        F: FnOnce() -> Outcome<T>,
        I: IntoIterator<Item = Handler<'h, T>>,
    {
        let handlers: Vec<_> = handlers.into_iter().collect();
        let mut frame = ScopeFrame::enter(self, &handlers);

        let id = match attempt().into_result() {
            Ok(value) => return Outcome::success(value),
            Err(id) => id,
        };

        let fetched = frame.take(id);
        if fetched.is_empty() {
            trace!(failure = %id, "no diagnostics deposited for this scope");
        }
        match dispatch(handlers, &fetched) {
            Some(value) => {
                self.mark_handled(id);
                debug!(failure = %id, "failure handled");
                Outcome::success(value)
            }
            None => {
                debug!(failure = %id, "no handler satisfiable; propagating");
                frame.propagate(fetched);
                Outcome::failure(id)
            }
        }
    }

    /// Terminal handling scope: like [`try_handle_some`](Self::try_handle_some),
    /// but a failure no handler can take is a contract violation.
    #[track_caller]
    pub fn try_handle_all<'h, T, F, I>(&self, attempt: F, handlers: I) -> T
    where
        F: FnOnce() -> Outcome<T>,
        I: IntoIterator<Item = Handler<'h, T>>,
    {
        match self.try_handle_some(attempt, handlers).into_result() {
            Ok(value) => value,
            Err(id) => self.violated(ContractViolation::Unhandled { failure: id.get() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Code(u8);

    #[derive(Clone, Debug, PartialEq)]
    struct Path(&'static str);

    #[test]
    fn success_skips_handlers_and_releases_slots() {
        let ch = ErrorChannel::new();
        let got = ch.try_handle_some(
            || Outcome::success(10),
            [Handler::new(|_: &Code| -> i32 { unreachable!("handler ran on success") })],
        );
        assert_eq!(got.into_value(), 10);
        assert_eq!(ch.depth(), 0);
    }

    #[test]
    fn slots_registered_once_per_type() {
        let ch = ErrorChannel::new();
        let seen = ch.try_handle_some(
            || Outcome::success(ch.depth()),
            [
                Handler::new(|_: &Code| 0),
                Handler::new(|_: &Code, _: &Path| 0),
                Handler::new(|| 0).matching([Code(1)]),
            ],
        );
        assert_eq!(seen.into_value(), 2);
    }

    #[test]
    fn unmatched_failure_keeps_id_and_releases_slots() {
        let ch = ErrorChannel::new();
        let got = ch.try_handle_some(
            || ch.new_error::<u8, _>((Code(1),)),
            [Handler::new(|_: &Code, _: &Path| 0u8)],
        );
        assert_eq!(got.failure_id(), ch.last_id().expect("minted"));
        assert_eq!(ch.depth(), 0);
    }

    #[test]
    fn handler_may_open_nested_scope() {
        let ch = ErrorChannel::new();
        let got = ch.try_handle_some(
            || ch.new_error((Code(4),)),
            [Handler::new(|c: &Code| {
                let inner = ch.try_handle_some(
                    || ch.new_error((Path("inner"),)),
                    [Handler::new(|p: &Path| p.0.len())],
                );
                usize::from(c.0) + inner.into_value()
            })],
        );
        assert_eq!(got.into_value(), 9);
        assert_eq!(ch.depth(), 0);
    }

    #[test]
    fn attempt_panic_still_releases_slots() {
        let ch = ErrorChannel::new();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ch.try_handle_some(
                || -> Outcome<()> { panic!("attempt blew up") },
                [Handler::new(|_: &Code| ())],
            )
        }));
        assert!(caught.is_err());
        assert_eq!(ch.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "no handler in a terminal handling scope matched")]
    fn terminal_scope_rejects_unhandled_failure() {
        let ch = ErrorChannel::new();
        let _: u8 = ch.try_handle_all(|| ch.new_error(()), [Handler::new(|_: &Code| 1u8)]);
    }
}
