//! Error taxonomy for the ferry error channel.
//!
//! Two classes of trouble exist around an error channel. Domain failures are
//! data: a failed `Outcome` plus whatever diagnostic objects were deposited for
//! it. They never show up here. Contract violations are misuse of the channel
//! itself (reading the value of a failed outcome, releasing slots out of
//! order, running off the end of a terminal handling scope) and are fatal.
//!
//! This crate names the violations and decides how they end the program.
pub mod policy;
pub mod violation;

// public exports
pub use policy::{ConfigError, ViolationPolicy};
pub use violation::ContractViolation;
