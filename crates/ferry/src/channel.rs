//! Per-context registry of failure ids and typed diagnostic slots.
//!
//! A channel owns one counter and, for every diagnostic type somebody declared
//! interest in, a LIFO stack of slots. Each active handling scope owns one slot
//! per type it cares about; the innermost slot of a type is the only place a
//! deposit of that type can land. Slot contents are tagged with the failure id
//! they were written under, and a fetch for any other id sees nothing.
//!
//! The channel is `Send` but not `Sync`: it belongs to exactly one logical
//! thread of control at a time and is passed around by reference.
use std::any::{Any, TypeId, type_name};
use std::cell::{Cell, RefCell};
use std::fmt;

use ferry_error::ContractViolation;
use fxhash::FxHashMap;
use tracing::trace;

use crate::config::{ChannelBuilder, ChannelConfig};
use crate::handler::Fetched;
use crate::id::{ChannelId, FailureId};

/// Anything that can be deposited as failure detail.
pub trait Diagnostic: Any + Send {}

impl<T: Any + Send> Diagnostic for T {}

pub(crate) type Boxed = Box<dyn Any + Send>;

/// How a deposit treats a slot that already holds an object for the same failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositMode {
    /// Overwrite. Used by direct failure constructors and `load`.
    Replace,
    /// Leave the existing object in place. Used by deferred `on_error` guards,
    /// so the innermost context attached to a failure wins.
    KeepExisting,
}

struct Slot {
    serial: u64,
    content: Option<(FailureId, Boxed)>,
}

/// Proof of a slot registration. Must go back to [`ErrorChannel::release`] in
/// strict LIFO order relative to every other handle of the same channel.
#[must_use = "a registered slot must be released in LIFO order"]
#[derive(Debug)]
pub struct SlotHandle {
    pub(crate) channel: ChannelId,
    pub(crate) serial: u64,
    pub(crate) ty: TypeId,
    pub(crate) type_name: &'static str,
}

impl SlotHandle {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Registration order within the issuing channel.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// A release the channel refused. The slot is still registered.
#[derive(Debug, thiserror::Error)]
#[error("{violation}")]
pub struct ReleaseRejected {
    handle: SlotHandle,
    violation: ContractViolation,
}

impl ReleaseRejected {
    pub fn violation(&self) -> &ContractViolation {
        &self.violation
    }

    /// Take the handle back, to release it in the right order.
    pub fn into_handle(self) -> SlotHandle {
        self.handle
    }
}

pub struct ErrorChannel {
    id: ChannelId,
    config: ChannelConfig,
    last_id: Cell<u64>,
    /// Newest id a handling scope recovered from.
    last_handled: Cell<u64>,
    next_serial: Cell<u64>,
    slots: RefCell<FxHashMap<TypeId, Vec<Slot>>>,
    /// Serials of outstanding handles, innermost last.
    order: RefCell<Vec<u64>>,
}

impl ErrorChannel {
    /// A channel configured from the environment and defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::default()
    }

    pub(crate) fn with_config(config: ChannelConfig) -> Self {
        let slots = FxHashMap::with_capacity_and_hasher(config.slot_capacity, Default::default());
        ErrorChannel {
            id: ChannelId::fresh(),
            config,
            last_id: Cell::new(0),
            last_handled: Cell::new(0),
            next_serial: Cell::new(1),
            slots: RefCell::new(slots),
            order: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Mint a fresh id, strictly larger than every id this channel issued before.
    ///
    /// Running out of ids is a contract violation.
    #[track_caller]
    pub fn next_id(&self) -> FailureId {
        let Some(id) = FailureId::after(self.last_id.get()) else {
            self.violated(ContractViolation::IdsExhausted {
                channel: self.id.get(),
            })
        };
        self.last_id.set(id.get());
        trace!(failure = %id, "failure id minted");
        id
    }

    /// The most recently minted id, if any failure happened on this channel.
    pub fn last_id(&self) -> Option<FailureId> {
        FailureId::from_counter(self.last_id.get())
    }

    /// The most recent failure, unless a handling scope already recovered
    /// from it.
    pub fn pending_id(&self) -> Option<FailureId> {
        self.last_id().filter(|id| id.get() != self.last_handled.get())
    }

    pub(crate) fn mark_handled(&self, id: FailureId) {
        if id.get() > self.last_handled.get() {
            self.last_handled.set(id.get());
        }
    }

    /// Push a new innermost slot for `E`.
    pub fn register_interest<E: Diagnostic>(&self) -> SlotHandle {
        self.register_raw(TypeId::of::<E>(), type_name::<E>())
    }

    pub(crate) fn register_raw(&self, ty: TypeId, type_name: &'static str) -> SlotHandle {
        let serial = self.next_serial.get();
        self.next_serial.set(serial + 1);
        self.slots.borrow_mut().entry(ty).or_default().push(Slot {
            serial,
            content: None,
        });
        self.order.borrow_mut().push(serial);
        trace!(ty = type_name, serial, "slot registered");
        SlotHandle {
            channel: self.id,
            serial,
            ty,
            type_name,
        }
    }

    /// Pop the slot behind `handle`. Releasing anything but the innermost
    /// outstanding handle is a contract violation.
    #[track_caller]
    pub fn release(&self, handle: SlotHandle) {
        if let Err(violation) = self.pop_slot(&handle, None) {
            self.violated(violation)
        }
    }

    /// Like [`release`](Self::release), but reports the violation instead of
    /// enforcing it. A rejected handle stays registered and comes back inside
    /// the error.
    pub fn try_release(&self, handle: SlotHandle) -> Result<(), ReleaseRejected> {
        match self.pop_slot(&handle, None) {
            Ok(()) => Ok(()),
            Err(violation) => Err(ReleaseRejected { handle, violation }),
        }
    }

    /// Pop a slot. With `propagate` set, an object stored for that failure is
    /// re-offered to the next outer slot of the same type.
    pub(crate) fn pop_slot(
        &self,
        handle: &SlotHandle,
        propagate: Option<FailureId>,
    ) -> Result<(), ContractViolation> {
        let type_name = handle.type_name;
        if handle.channel != self.id {
            return Err(ContractViolation::ForeignHandle {
                type_name,
                owner: handle.channel.get(),
                channel: self.id.get(),
            });
        }

        let mut order = self.order.borrow_mut();
        match order.last() {
            Some(&top) if top == handle.serial => {}
            Some(&top) => {
                return Err(ContractViolation::ReleaseOutOfOrder {
                    type_name,
                    released: handle.serial,
                    expected: top,
                });
            }
            None => return Err(ContractViolation::ReleaseWithoutRegistration { type_name }),
        }

        let mut slots = self.slots.borrow_mut();
        let Some(stack) = slots.get_mut(&handle.ty) else {
            return Err(ContractViolation::ReleaseWithoutRegistration { type_name });
        };
        match stack.last() {
            Some(slot) if slot.serial == handle.serial => {}
            Some(slot) => {
                return Err(ContractViolation::ReleaseOutOfOrder {
                    type_name,
                    released: handle.serial,
                    expected: slot.serial,
                });
            }
            None => return Err(ContractViolation::ReleaseWithoutRegistration { type_name }),
        }
        let Some(slot) = stack.pop() else {
            return Err(ContractViolation::ReleaseWithoutRegistration { type_name });
        };
        order.pop();

        if let (Some(failure), Some((stored, object))) = (propagate, slot.content) {
            if stored == failure {
                match stack.last_mut() {
                    Some(outer) => {
                        trace!(ty = type_name, %failure, into = outer.serial, "diagnostic re-offered to outer slot");
                        outer.content = Some((stored, object));
                    }
                    None => trace!(ty = type_name, %failure, "no outer interest; diagnostic dropped"),
                }
            }
        }
        trace!(ty = type_name, serial = handle.serial, "slot released");
        Ok(())
    }

    /// Store `object` for failure `id` in the innermost slot for `E`.
    ///
    /// Returns `false` when nobody currently declares interest in `E`; the
    /// object is then dropped. Failure detail is opportunistic.
    pub fn deposit<E: Diagnostic>(&self, object: E, id: FailureId) -> bool {
        self.store(object, id, DepositMode::Replace)
    }

    pub(crate) fn store<E: Diagnostic>(&self, object: E, id: FailureId, mode: DepositMode) -> bool {
        let ty = type_name::<E>();
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots
            .get_mut(&TypeId::of::<E>())
            .and_then(|stack| stack.last_mut())
        else {
            trace!(ty, failure = %id, "no interest registered; diagnostic discarded");
            return false;
        };
        if mode == DepositMode::KeepExisting
            && matches!(&slot.content, Some((stored, _)) if *stored == id)
        {
            trace!(ty, failure = %id, "slot already holds this failure's diagnostic");
            return false;
        }
        let previous = slot.content.replace((id, Box::new(object)));
        trace!(ty, failure = %id, serial = slot.serial, "diagnostic deposited");
        // user Drop impls run after the borrow ends
        drop(slots);
        drop(previous);
        true
    }

    /// Clone out the innermost `E` if it was stored for failure `id`.
    pub fn fetch<E: Diagnostic + Clone>(&self, id: FailureId) -> Option<E> {
        self.fetch_with(id, E::clone)
    }

    /// Borrow the innermost `E` stored for failure `id`. Reading does not
    /// consume the object. `f` must not call back into this channel.
    pub fn fetch_with<E: Diagnostic, R>(&self, id: FailureId, f: impl FnOnce(&E) -> R) -> Option<R> {
        let slots = self.slots.borrow();
        let (stored, object) = slots.get(&TypeId::of::<E>())?.last()?.content.as_ref()?;
        if *stored != id {
            return None;
        }
        (**object).downcast_ref::<E>().map(f)
    }

    /// Whether some active slot would accept a deposit of `E`.
    pub fn is_interested<E: Diagnostic>(&self) -> bool {
        self.slots
            .borrow()
            .get(&TypeId::of::<E>())
            .is_some_and(|stack| !stack.is_empty())
    }

    /// Number of outstanding slot registrations.
    pub fn depth(&self) -> usize {
        self.order.borrow().len()
    }

    /// Move this failure's objects out of the given slots.
    pub(crate) fn take_for(&self, handles: &[SlotHandle], id: FailureId) -> Fetched {
        let mut slots = self.slots.borrow_mut();
        let entries = handles
            .iter()
            .filter_map(|handle| {
                let slot = slots
                    .get_mut(&handle.ty)?
                    .iter_mut()
                    .rev()
                    .find(|slot| slot.serial == handle.serial)?;
                match slot.content.take() {
                    Some((stored, object)) if stored == id => Some((handle.ty, object)),
                    stale => {
                        slot.content = stale;
                        None
                    }
                }
            })
            .collect();
        Fetched::new(id, entries)
    }

    /// Put objects taken by [`take_for`](Self::take_for) back where they came from.
    pub(crate) fn restore(&self, handles: &[SlotHandle], fetched: Fetched) {
        let id = fetched.id();
        let mut slots = self.slots.borrow_mut();
        for (ty, object) in fetched.into_entries() {
            let Some(handle) = handles.iter().find(|handle| handle.ty == ty) else {
                continue;
            };
            let slot = slots
                .get_mut(&ty)
                .and_then(|stack| stack.iter_mut().rev().find(|slot| slot.serial == handle.serial));
            if let Some(slot) = slot {
                slot.content = Some((id, object));
            }
        }
    }

    #[track_caller]
    pub(crate) fn violated(&self, violation: ContractViolation) -> ! {
        self.config.on_violation.enforce(violation)
    }
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("id", &self.id.get())
            .field("last_id", &self.last_id())
            .field("depth", &self.order.try_borrow().map(|order| order.len()).ok())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
