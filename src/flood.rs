//! Per-user duplicate-message suppression.
//!
//! Multi-client relays and misbehaving scripts tend to repeat the same
//! line in quick succession. Rather than banning, the guard mutes the
//! offending user mask for one minute; the mute expires on its own.

use std::collections::HashMap;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Two identical messages closer together than this trigger a mute.
const DUPLICATE_WINDOW: Duration = Duration::from_millis(3000);

/// How long a triggered mute lasts.
const MUTE_DURATION: Duration = Duration::from_millis(60_000);

/// Per-mask tracking state.
#[derive(Debug)]
struct FloodState {
    /// The last message text seen from this mask (trimmed).
    last_text: String,
    /// When that message arrived.
    last_at: Instant,
    /// Active mute, if any.
    ignored_until: Option<Instant>,
}

/// Tracks the last message per user mask and silently mutes repeats.
///
/// Owned by the per-server inbound task; state is read-then-written
/// without synchronization, so there must be exactly one caller.
#[derive(Debug, Default)]
pub struct FloodGuard {
    states: HashMap<String, FloodState>,
}

impl FloodGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a message from `mask` should be dropped.
    ///
    /// An active mute drops the message without touching any other
    /// state. A duplicate of the previous message inside the 3 second
    /// window installs a 60 second mute and drops the message. Anything
    /// else is recorded as the new last message and passes.
    pub fn should_ignore(&mut self, mask: &str, text: &str, now: Instant) -> bool {
        let mute = self.states.get(mask).and_then(|state| state.ignored_until);
        match mute {
            Some(until) if until > now => return true,
            Some(_) => {
                // Mute has run out; forget the mask entirely.
                self.states.remove(mask);
            }
            None => {}
        }

        let trimmed = text.trim();

        if let Some(state) = self.states.get_mut(mask) {
            if state.last_text.eq_ignore_ascii_case(trimmed)
                && now.duration_since(state.last_at) < DUPLICATE_WINDOW
            {
                state.ignored_until = Some(now + MUTE_DURATION);
                debug!(mask, "duplicate message, muting");
                return true;
            }
            state.last_text = trimmed.to_string();
            state.last_at = now;
            state.ignored_until = None;
            return false;
        }

        self.states.insert(
            mask.to_string(),
            FloodState {
                last_text: trimmed.to_string(),
                last_at: now,
                ignored_until: None,
            },
        );
        false
    }
}
