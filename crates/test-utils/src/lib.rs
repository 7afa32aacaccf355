//! Shared fixtures for the ferry test suites.
//!
//! Diagnostic types here mirror what real callers deposit: an error code enum,
//! source positions and a parse error kind.

/// Install a fmt subscriber honoring `RUST_LOG`, writing through the test
/// harness so output is captured per test. Returns `true` if this call
/// installed it.
pub fn init_tracing() -> bool {
    use tracing_subscriber::{EnvFilter, fmt};
    fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Err1 {
    E1,
    E2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Err2 {
    E1,
    E2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    BadSyntax,
    UnexpectedEof,
}

/// 1-based line number of the input being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ELine(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EFile(pub String);

impl From<&str> for EFile {
    fn from(name: &str) -> Self {
        EFile(name.to_string())
    }
}

/// Counts how many times a value of this type was dropped.
#[derive(Debug)]
pub struct DropCounter(pub std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tracing::trace!("DropCounter dropped");
    }
}
