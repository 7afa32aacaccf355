//! Channels bound to a tokio task rather than to a worker thread.
//!
//! Many tasks can share one worker thread and interleave at every `.await`;
//! a thread-keyed channel would let them see each other's slots. [`scope`]
//! gives the wrapped future its own [`ErrorChannel`] for its whole life, on
//! whichever worker polls it.
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use ferry::{Handler, Outcome, task};
//!
//! #[derive(Debug)]
//! struct Timeout(u64);
//!
//! let ms = task::scope(async {
//!     tokio::task::yield_now().await;
//!     task::with(|ch| {
//!         ch.try_handle_all(
//!             || -> Outcome<u64> { ch.new_error((Timeout(250),)) },
//!             [Handler::new(|t: &Timeout| t.0)],
//!         )
//!     })
//! })
//! .await;
//! assert_eq!(ms, 250);
//! # });
//! ```
use std::future::Future;

use crate::ErrorChannel;

tokio::task_local! {
    static CHANNEL: ErrorChannel;
}

/// Run `future` with a fresh channel bound to it.
pub async fn scope<F: Future>(future: F) -> F::Output {
    scope_with(ErrorChannel::new(), future).await
}

/// Run `future` with `channel` bound to it.
pub async fn scope_with<F: Future>(channel: ErrorChannel, future: F) -> F::Output {
    tracing::trace!(?channel, "task channel bound");
    CHANNEL.scope(channel, future).await
}

/// Access the current task's channel.
///
/// # Panics
/// Outside of [`scope`]. Use [`try_with`] when that is expected.
pub fn with<R>(f: impl FnOnce(&ErrorChannel) -> R) -> R {
    CHANNEL.with(f)
}

/// Access the current task's channel, `None` outside of [`scope`].
pub fn try_with<R>(f: impl FnOnce(&ErrorChannel) -> R) -> Option<R> {
    CHANNEL.try_with(f).ok()
}
