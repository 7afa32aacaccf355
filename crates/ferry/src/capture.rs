use tracing::{debug, trace};

use crate::channel::{DepositMode, Diagnostic};
use crate::{ErrorChannel, FailureId, Outcome};

/// A bundle of diagnostic objects deposited together: `()` or a tuple of up
/// to eight [`Diagnostic`] values.
pub trait Diagnostics {
    /// Deposit every object under `id`, returning how many found a slot.
    fn deposit_into(self, channel: &ErrorChannel, id: FailureId, mode: DepositMode) -> usize;
}

impl Diagnostics for () {
    fn deposit_into(self, _channel: &ErrorChannel, _id: FailureId, _mode: DepositMode) -> usize {
        0
    }
}

macro_rules! impl_diagnostics_for_tuple {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: Diagnostic),+> Diagnostics for ($($ty,)+) {
            fn deposit_into(self, channel: &ErrorChannel, id: FailureId, mode: DepositMode) -> usize {
                let ($($var,)+) = self;
                0 $(+ usize::from(channel.store($var, id, mode)))+
            }
        }
    };
}

impl_diagnostics_for_tuple!(A a);
impl_diagnostics_for_tuple!(A a, B b);
impl_diagnostics_for_tuple!(A a, B b, C c);
impl_diagnostics_for_tuple!(A a, B b, C c, D d);
impl_diagnostics_for_tuple!(A a, B b, C c, D d, E e);
impl_diagnostics_for_tuple!(A a, B b, C c, D d, E e, F f);
impl_diagnostics_for_tuple!(A a, B b, C c, D d, E e, F f, G g);
impl_diagnostics_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);

impl ErrorChannel {
    /// Start a new failure: mint an id, deposit `objects` under it and return
    /// the failed outcome.
    ///
    /// ```rust
    /// use ferry::{ErrorChannel, Outcome};
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct NotFound(&'static str);
    ///
    /// let ch = ErrorChannel::new();
    /// let interest = ch.register_interest::<NotFound>();
    /// let failed: Outcome<u32> = ch.new_error((NotFound("config.toml"),));
    /// assert_eq!(ch.fetch::<NotFound>(failed.failure_id()), Some(NotFound("config.toml")));
    /// ch.release(interest);
    /// ```
    pub fn new_error<T, D: Diagnostics>(&self, objects: D) -> Outcome<T> {
        let id = self.next_id();
        let stored = objects.deposit_into(self, id, DepositMode::Replace);
        debug!(failure = %id, stored, "new failure");
        Outcome::failure(id)
    }

    /// Attach more objects to an already-minted failure.
    pub fn load<D: Diagnostics>(&self, id: FailureId, objects: D) -> usize {
        let stored = objects.deposit_into(self, id, DepositMode::Replace);
        trace!(failure = %id, stored, "diagnostics loaded");
        stored
    }

    /// Deferred attachment: deposit `objects` only if a failure is minted on
    /// this channel while the returned guard is alive and is still
    /// propagating when the guard drops.
    ///
    /// Objects are captured now. They never overwrite an object already stored
    /// for the same failure, so when guards nest the innermost one wins.
    pub fn on_error<D>(&self, objects: D) -> OnError<'_, impl FnOnce(&ErrorChannel, FailureId) -> usize>
    where
        D: Diagnostics,
    {
        self.on_error_with(move || objects)
    }

    /// Like [`on_error`](Self::on_error), but the objects are only built if a
    /// deposit actually happens.
    pub fn on_error_with<D, F>(&self, make: F) -> OnError<'_, impl FnOnce(&ErrorChannel, FailureId) -> usize>
    where
        D: Diagnostics,
        F: FnOnce() -> D,
    {
        OnError {
            channel: self,
            observed: self.last_id(),
            deposit: Some(move |channel: &ErrorChannel, id: FailureId| {
                make().deposit_into(channel, id, DepositMode::KeepExisting)
            }),
        }
    }
}

/// Guard returned by [`ErrorChannel::on_error`].
///
/// On drop it deposits its objects under the newest failure id if that id was
/// minted after the guard was created and no handling scope has recovered
/// from it yet; otherwise it discards them.
#[must_use = "the guard deposits when dropped; binding it to `_` drops it immediately"]
pub struct OnError<'c, F>
where
    F: FnOnce(&ErrorChannel, FailureId) -> usize,
{
    channel: &'c ErrorChannel,
    observed: Option<FailureId>,
    deposit: Option<F>,
}

impl<F> OnError<'_, F>
where
    F: FnOnce(&ErrorChannel, FailureId) -> usize,
{
    /// The last id minted before this guard existed.
    pub fn observed(&self) -> Option<FailureId> {
        self.observed
    }

    /// Deposit for `outcome` now if it is a failure newer than this guard, then disarm.
    pub fn attach<T>(mut self, outcome: Outcome<T>) -> Outcome<T> {
        if let (Some(deposit), Some(id)) = (self.deposit.take(), outcome.try_failure_id()) {
            if self.is_newer(id) {
                let stored = deposit(self.channel, id);
                trace!(failure = %id, stored, "on_error attached");
            }
        }
        outcome
    }

    /// Disarm without depositing.
    pub fn dismiss(mut self) {
        self.deposit = None;
    }

    fn is_newer(&self, id: FailureId) -> bool {
        self.observed.is_none_or(|seen| id > seen)
    }
}

impl<F> Drop for OnError<'_, F>
where
    F: FnOnce(&ErrorChannel, FailureId) -> usize,
{
    fn drop(&mut self) {
        let Some(deposit) = self.deposit.take() else {
            return;
        };
        match self.channel.pending_id() {
            Some(id) if self.is_newer(id) => {
                let stored = deposit(self.channel, id);
                trace!(failure = %id, stored, "on_error deposited");
            }
            _ => trace!("on_error guard exited without a new failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Line(u32);

    #[derive(Clone, Debug, PartialEq)]
    struct File(&'static str);

    fn failing(ch: &ErrorChannel) -> Outcome<()> {
        ch.new_error(())
    }

    #[test]
    fn new_error_deposits_every_object() {
        let ch = ErrorChannel::new();
        let (hl, hf) = (ch.register_interest::<Line>(), ch.register_interest::<File>());
        let o: Outcome<()> = ch.new_error((Line(1), File("x")));
        let id = o.failure_id();
        assert_eq!(ch.fetch::<Line>(id), Some(Line(1)));
        assert_eq!(ch.fetch::<File>(id), Some(File("x")));
        ch.release(hf);
        ch.release(hl);
    }

    #[test]
    fn load_adds_to_existing_failure() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let id = failing(&ch).failure_id();
        assert_eq!(ch.load(id, (Line(12),)), 1);
        assert_eq!(ch.fetch::<Line>(id), Some(Line(12)));
        ch.release(h);
    }

    #[test]
    fn on_error_discards_on_success() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        {
            let _g = ch.on_error((Line(5),));
        }
        let later = failing(&ch).failure_id();
        assert_eq!(ch.fetch::<Line>(later), None);
        ch.release(h);
    }

    #[test]
    fn on_error_deposits_when_failure_arises() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let id = {
            let _g = ch.on_error((Line(5),));
            failing(&ch).failure_id()
        };
        assert_eq!(ch.fetch::<Line>(id), Some(Line(5)));
        ch.release(h);
    }

    #[test]
    fn on_error_ignores_failures_older_than_itself() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let old = failing(&ch);
        let relayed = {
            let g = ch.on_error((Line(1),));
            g.attach(old)
        };
        assert_eq!(ch.fetch::<Line>(relayed.failure_id()), None);
        ch.release(h);
    }

    #[test]
    fn nested_guards_innermost_wins() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let id = {
            let _outer = ch.on_error((Line(1),));
            let _inner = ch.on_error((Line(2),));
            failing(&ch).failure_id()
        };
        assert_eq!(ch.fetch::<Line>(id), Some(Line(2)));
        ch.release(h);
    }

    #[test]
    fn lazy_objects_built_only_on_failure() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<File>();
        let built = std::cell::Cell::new(0);
        {
            let _g = ch.on_error_with(|| {
                built.set(built.get() + 1);
                (File("never"),)
            });
        }
        assert_eq!(built.get(), 0);
        let id = {
            let _g = ch.on_error_with(|| {
                built.set(built.get() + 1);
                (File("once"),)
            });
            failing(&ch).failure_id()
        };
        assert_eq!(built.get(), 1);
        assert_eq!(ch.fetch::<File>(id), Some(File("once")));
        ch.release(h);
    }

    #[test]
    fn on_error_skips_failure_recovered_inside_its_scope() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let recovered = {
            let _g = ch.on_error((Line(6),));
            let id = failing(&ch).failure_id();
            ch.mark_handled(id);
            id
        };
        assert_eq!(ch.fetch::<Line>(recovered), None);
        ch.release(h);
    }

    #[test]
    fn dismissed_guard_never_deposits() {
        let ch = ErrorChannel::new();
        let h = ch.register_interest::<Line>();
        let g = ch.on_error((Line(8),));
        let id = failing(&ch).failure_id();
        g.dismiss();
        assert_eq!(ch.fetch::<Line>(id), None);
        ch.release(h);
    }
}
