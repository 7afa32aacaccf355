use ferry_error::ViolationPolicy;

use crate::ErrorChannel;

/// Environment variable consulted for the violation policy when the builder
/// does not set one explicitly. Accepts `panic` or `abort`.
pub const ON_VIOLATION_ENV: &str = "FERRY_ON_VIOLATION";

/// Number of distinct diagnostic types a channel preallocates slot stacks for.
pub const DEFAULT_SLOT_CAPACITY: usize = 8;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub on_violation: ViolationPolicy,
    pub slot_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            on_violation: ViolationPolicy::default(),
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }
}

/// Builder for an [`ErrorChannel`].
///
/// ```rust
/// use ferry::{ErrorChannel, ViolationPolicy};
///
/// let channel = ErrorChannel::builder()
///     .with_violation_policy(ViolationPolicy::Abort)
///     .with_slot_capacity(2)
///     .build();
/// assert_eq!(channel.config().on_violation, ViolationPolicy::Abort);
/// ```
#[derive(Default, Debug)]
pub struct ChannelBuilder {
    on_violation: Option<ViolationPolicy>,
    slot_capacity: Option<usize>,
}

impl ChannelBuilder {
    /// Set the policy explicitly, overriding `FERRY_ON_VIOLATION`.
    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.on_violation = Some(policy);
        self
    }

    /// Preallocate slot stacks for this many diagnostic types.
    pub fn with_slot_capacity(mut self, capacity: usize) -> Self {
        self.slot_capacity = Some(capacity);
        self
    }

    /// Start from a complete config; explicit builder calls made afterwards still win.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.on_violation = Some(config.on_violation);
        self.slot_capacity = Some(config.slot_capacity);
        self
    }

    pub fn build(self) -> ErrorChannel {
        let env_override = std::env::var(ON_VIOLATION_ENV)
            .ok()
            .and_then(|raw| match raw.parse::<ViolationPolicy>() {
                Ok(policy) => Some(policy),
                Err(error) => {
                    tracing::warn!(%error, var = ON_VIOLATION_ENV, "ignoring invalid violation policy");
                    None
                }
            });

        let config = ChannelConfig {
            on_violation: resolve_violation_policy(self.on_violation, env_override),
            slot_capacity: self.slot_capacity.unwrap_or(DEFAULT_SLOT_CAPACITY),
        };
        ErrorChannel::with_config(config)
    }
}

/// Precedence: builder override > env override > default (`panic`).
pub(crate) fn resolve_violation_policy(
    builder_override: Option<ViolationPolicy>,
    env_override: Option<ViolationPolicy>,
) -> ViolationPolicy {
    builder_override.or(env_override).unwrap_or_default()
}
