//! Outbound send throttling.
//!
//! IRC servers disconnect clients that send lines too quickly. The
//! [`RateGate`] reserves virtual send time per line so the bot stays
//! under that limit while still allowing short bursts.

use tokio::time::{Duration, Instant};

/// How far ahead of real time the reservation may run before sends are
/// denied. This is the burst window: a quiet bot may fire several lines
/// back to back, but sustained output settles to one line per cost.
const BURST_ALLOWANCE: Duration = Duration::from_secs(10);

/// Virtual-time send throttle.
///
/// Not internally synchronized: the send worker is the only caller.
#[derive(Debug)]
pub struct RateGate {
    /// The moment the reservation runs out.
    next_allowed: Instant,
}

impl RateGate {
    pub fn new(now: Instant) -> Self {
        Self { next_allowed: now }
    }

    /// Virtual cost of sending a line: a 2 second base plus 1 second per
    /// 128 bytes of length.
    fn cost(line_len: usize) -> Duration {
        Duration::from_secs(2 + (line_len / 128) as u64)
    }

    /// Decide whether a line of `line_len` bytes may be sent at `now`.
    ///
    /// On `true` the line's cost has been reserved; the caller must send
    /// it. On `false` nothing is reserved and the caller should retry
    /// later.
    pub fn check(&mut self, line_len: usize, now: Instant) -> bool {
        let cost = Self::cost(line_len);

        if self.next_allowed < now {
            // Reservation fully drained; restart from now.
            self.next_allowed = now + cost;
            true
        } else if self.next_allowed + cost < now + BURST_ALLOWANCE {
            self.next_allowed += cost;
            true
        } else {
            false
        }
    }
}
