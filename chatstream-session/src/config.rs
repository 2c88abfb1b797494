//! Session configuration.

use std::time::Duration;

/// Messages of trailing context sent to the provider per request.
pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

/// Minimum time between publications under the throttled policy.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(150);

/// Tick length of the incremental-reveal policy.
pub const DEFAULT_REVEAL_TICK: Duration = Duration::from_millis(30);

/// Shown in place of the assistant response when a send fails.
pub const FAILURE_MESSAGE: &str = "抱歉，发生了错误，请稍后再试。";

/// How streamed fragments reach the visible message slot.
///
/// Exactly one policy is active per send; both converge to the same final
/// string (the concatenation of all fragments in arrival order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Publish the full buffer at most once per `interval` (and always on
    /// the first fragment and at stream end).
    Throttled {
        /// Minimum time between publications.
        interval: Duration,
    },
    /// Reveal 1–3 buffered characters per `tick`, continuing after stream
    /// end until the visible text catches up with the buffer.
    Reveal {
        /// Tick length.
        tick: Duration,
    },
}

impl UpdatePolicy {
    /// Throttled policy with the default interval.
    #[must_use]
    pub fn throttled() -> Self {
        Self::Throttled {
            interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }

    /// Incremental-reveal policy with the default tick.
    #[must_use]
    pub fn reveal() -> Self {
        Self::Reveal {
            tick: DEFAULT_REVEAL_TICK,
        }
    }
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self::throttled()
    }
}

/// Configuration for a [`crate::ChatSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of trailing settled messages sent as provider context.
    pub context_window: usize,
    /// System prompt; the provider substitutes its default when `None`.
    pub system_prompt: Option<String>,
    /// The active fragment-publication policy.
    pub update_policy: UpdatePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            system_prompt: None,
            update_policy: UpdatePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Override the context window size.
    #[must_use]
    pub fn context_window(mut self, size: usize) -> Self {
        self.context_window = size;
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Select the fragment-publication policy.
    #[must_use]
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }
}
