/// Unwrap a successful [`Outcome`](crate::Outcome) or return its failure from
/// the enclosing function, re-typed to that function's `Outcome<U>`.
///
/// ```rust
/// use ferry::{ErrorChannel, Outcome, relay};
///
/// fn inner(ch: &ErrorChannel) -> Outcome<u8> {
///     ch.new_error(())
/// }
///
/// fn outer(ch: &ErrorChannel) -> Outcome<String> {
///     let byte = relay!(inner(ch));
///     Outcome::success(byte.to_string())
/// }
///
/// let ch = ErrorChannel::new();
/// assert_eq!(outer(&ch).failure_id(), ch.last_id().unwrap());
/// ```
#[macro_export]
macro_rules! relay {
    ($outcome:expr $(,)?) => {
        match $crate::Outcome::into_result($outcome) {
            ::core::result::Result::Ok(value) => value,
            ::core::result::Result::Err(id) => return $crate::Outcome::failure(id),
        }
    };
}
