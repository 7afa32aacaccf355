use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier minted once per failure event by an [`ErrorChannel`](crate::ErrorChannel).
///
/// Ids minted by one channel are strictly increasing. Ids from different
/// channels are unrelated and must not be compared or fetched across channels.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FailureId(NonZeroU64);

impl FailureId {
    /// The id following a counter that has issued `last` ids so far, `None`
    /// once the id space is exhausted.
    pub(crate) fn after(last: u64) -> Option<Self> {
        last.checked_add(1).and_then(NonZeroU64::new).map(FailureId)
    }

    /// Rebuild the id for a counter value, `None` while nothing was issued.
    pub(crate) fn from_counter(counter: u64) -> Option<Self> {
        NonZeroU64::new(counter).map(FailureId)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for FailureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failure#{}", self.0)
    }
}

impl From<FailureId> for u64 {
    fn from(id: FailureId) -> u64 {
        id.get()
    }
}

/// Process-unique tag of a channel instance, used to reject slot handles that
/// are released on a channel other than the one that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ChannelId(u64);

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(1);

impl ChannelId {
    pub(crate) fn fresh() -> Self {
        ChannelId(NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn get(self) -> u64 {
        self.0
    }
}
