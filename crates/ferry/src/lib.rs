//! ferry: failure detail that travels beside the call stack, not through it.
//!
//! Fallible functions return an [`Outcome<T>`]: a value, or a [`FailureId`].
//! Intermediate callers only relay that id (see [`relay!`]) and never name the
//! error types they pass through. The detail, arbitrary typed diagnostic
//! objects, is deposited straight into the [`ErrorChannel`] slot of the
//! nearest scope that declared interest in its type, so the cost of carrying it
//! does not depend on how deep the failure happened.
//!
//! Pieces
//! - [`ErrorChannel`]: per-context failure counter plus typed, LIFO slot stacks.
//! - [`ErrorChannel::new_error`] / [`ErrorChannel::on_error`]: attach objects
//!   immediately, or only if a failure arises while a guard is alive.
//! - [`ErrorChannel::try_handle_some`] / [`ErrorChannel::try_handle_all`]:
//!   handling scopes that pick the first satisfiable [`Handler`].
//! - [`Handler::matching`]: value predicates for "specific case, then fallback".
//! - [`task`] (feature `tokio`): a channel per tokio task.
//!
//! Misuse of the mechanism (reading the value of a failure, releasing slots out
//! of order, an unhandled failure in a terminal scope) is a contract violation
//! and is enforced by the channel's [`ViolationPolicy`].
//!
//! Quick start
//! ```rust
//! use ferry::{ErrorChannel, Handler, Outcome, relay};
//!
//! #[derive(Debug, PartialEq)]
//! enum ParseError { BadSyntax, Empty }
//! #[derive(Debug)]
//! struct Line(u32);
//!
//! fn parse_line(ch: &ErrorChannel, text: &str) -> Outcome<i64> {
//!     match text.trim() {
//!         "" => ch.new_error((ParseError::Empty,)),
//!         t => match t.parse() {
//!             Ok(v) => Outcome::success(v),
//!             Err(_) => ch.new_error((ParseError::BadSyntax,)),
//!         },
//!     }
//! }
//!
//! fn sum(ch: &ErrorChannel, text: &str) -> Outcome<i64> {
//!     let mut total = 0;
//!     for (n, line) in text.lines().enumerate() {
//!         let _at = ch.on_error((Line(n as u32 + 1),));
//!         total += relay!(parse_line(ch, line));
//!     }
//!     Outcome::success(total)
//! }
//!
//! let ch = ErrorChannel::new();
//! let report = ch.try_handle_all(
//!     || sum(&ch, "1\n2\nthree").map(|t| t.to_string()),
//!     [
//!         Handler::new(|_: &ParseError, l: &Line| format!("bad syntax on line {}", l.0))
//!             .matching([ParseError::BadSyntax]),
//!         Handler::any(|id| format!("unexpected {id}")),
//!     ],
//! );
//! assert_eq!(report, "bad syntax on line 3");
//! ```
mod capture;
mod channel;
pub mod config;
mod handler;
mod id;
mod macros;
mod outcome;
mod scope;
#[cfg(feature = "tokio")]
pub mod task;

// public exports
pub use capture::{Diagnostics, OnError};
pub use channel::{DepositMode, Diagnostic, ErrorChannel, ReleaseRejected, SlotHandle};
pub use config::{ChannelBuilder, ChannelConfig};
pub use handler::{Handler, IntoHandler};
pub use id::FailureId;
pub use outcome::Outcome;

pub use ferry_error::{ConfigError, ContractViolation, ViolationPolicy};
