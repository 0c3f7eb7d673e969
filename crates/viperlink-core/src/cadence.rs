// ── Polling cadence ──
//
// Two speed tiers: the configured normal interval (possibly disabled),
// and a short boosted interval with an absolute expiry, entered while a
// just-issued remote start is being monitored. Transitions take `now`
// explicitly so expiry logic is testable without a clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Refresh interval while boosted.
pub const BOOSTED_INTERVAL: Duration = Duration::from_secs(60);

/// Hard ceiling on how long a boost window lasts.
pub const BOOSTED_MAX_DURATION: Duration = Duration::from_secs(30 * 60);

/// Delay before the post-action refresh, giving the backend time to
/// reflect a just-issued command.
pub const ACTION_REFRESH_DELAY: Duration = Duration::from_secs(10);

/// Cadence state: Normal (configured interval, possibly disabled) or
/// Boosted (short interval with an absolute expiry).
#[derive(Debug, Clone)]
pub struct Cadence {
    normal: Option<Duration>,
    boosted_until: Option<DateTime<Utc>>,
}

impl Cadence {
    /// Start in the Normal tier. `None` means automatic polling is
    /// disabled and only explicit requests trigger refreshes.
    pub fn new(normal: Option<Duration>) -> Self {
        Self {
            normal,
            boosted_until: None,
        }
    }

    /// The interval the poll timer should use right now.
    pub fn current_interval(&self) -> Option<Duration> {
        if self.boosted_until.is_some() {
            Some(BOOSTED_INTERVAL)
        } else {
            self.normal
        }
    }

    pub fn is_boosted(&self) -> bool {
        self.boosted_until.is_some()
    }

    /// Enter the Boosted tier. Idempotent: boosting while already
    /// boosted resets the expiry window.
    pub fn boost(&mut self, now: DateTime<Utc>) {
        let until = now + BOOSTED_MAX_DURATION;
        self.boosted_until = Some(until);
        debug!(until = %until, interval = ?BOOSTED_INTERVAL, "boosted polling enabled");
    }

    /// Revert to Normal if the boost window elapsed or no vehicle still
    /// reports an active remote start. Expiry wins even while a starter
    /// is active. Returns `true` if a downgrade happened.
    pub fn downgrade_if_due(&mut self, now: DateTime<Utc>, any_remote_active: bool) -> bool {
        let Some(until) = self.boosted_until else {
            return false;
        };

        if now >= until {
            debug!("boosted polling max duration reached, resetting to normal");
            self.reset_to_normal();
            return true;
        }

        if !any_remote_active {
            debug!("no vehicle has remote start active, resetting to normal");
            self.reset_to_normal();
            return true;
        }

        false
    }

    fn reset_to_normal(&mut self) {
        self.boosted_until = None;
        match self.normal {
            Some(interval) => debug!(?interval, "polling interval reset"),
            None => debug!("polling interval reset to disabled (manual refresh only)"),
        }
    }
}
