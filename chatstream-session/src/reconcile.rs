//! Buffer reconcilers: turn a fragment sequence into bounded-rate updates of
//! the visible message slot.
//!
//! Both reconcilers keep an append-only buffer as the source of truth and
//! differ only in when they publish. A publication always carries a prefix of
//! the buffer (the throttled policy publishes the whole buffer, the reveal
//! policy a growing prefix), so a skipped publication loses nothing: the
//! next one resends everything up to its point. `finish()` returns the full
//! buffer on both, which is what makes the two policies converge.

use std::time::Duration;

use tokio::time::Instant;

/// Publishes the full buffer at most once per interval.
///
/// The first fragment always publishes so the placeholder shows content as
/// soon as any arrives. The caller flushes the final buffer via
/// [`ThrottledReconciler::finish`] at stream end, regardless of timing.
#[derive(Debug)]
pub struct ThrottledReconciler {
    buffer: String,
    interval: Duration,
    last_publish: Option<Instant>,
}

impl ThrottledReconciler {
    /// Create a reconciler publishing at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            buffer: String::new(),
            interval,
            last_publish: None,
        }
    }

    /// Append a fragment. Returns the full buffer when a publication is due.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);
        let now = Instant::now();
        let due = self
            .last_publish
            .is_none_or(|at| now.duration_since(at) >= self.interval);
        if due {
            self.last_publish = Some(now);
            Some(self.buffer.clone())
        } else {
            None
        }
    }

    /// Consume the reconciler, returning the complete buffered content.
    #[must_use]
    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Reveals 1–3 buffered characters per tick, independent of arrival timing.
///
/// Ticking continues after stream end until the visible prefix catches up
/// with the buffer. The step scales with the backlog so long responses do
/// not crawl: 3 characters when ≥ 24 behind, 2 when ≥ 8, else 1.
#[derive(Debug, Default)]
pub struct RevealReconciler {
    buffer: String,
    /// Byte offset of the visible prefix; always on a char boundary.
    visible: usize,
}

impl RevealReconciler {
    /// Create an empty reconciler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the buffer without publishing.
    pub fn push(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    /// Whether the visible prefix has caught up with the buffer.
    #[must_use]
    pub fn is_caught_up(&self) -> bool {
        self.visible >= self.buffer.len()
    }

    /// Advance one tick. Returns the new visible prefix, or `None` when
    /// already caught up.
    pub fn tick(&mut self) -> Option<String> {
        if self.is_caught_up() {
            return None;
        }
        let pending = &self.buffer[self.visible..];
        let backlog = pending.chars().count();
        let step = if backlog >= 24 {
            3
        } else if backlog >= 8 {
            2
        } else {
            1
        };
        let advance: usize = pending.chars().take(step).map(char::len_utf8).sum();
        self.visible += advance;
        Some(self.buffer[..self.visible].to_string())
    }

    /// Consume the reconciler, returning the complete buffered content.
    #[must_use]
    pub fn finish(self) -> String {
        self.buffer
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
