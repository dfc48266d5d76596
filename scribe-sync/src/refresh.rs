//! Throttling of external refreshes
//!
//! A refresh replaces the live document with server data. It is refused while
//! a local edit is being committed, while another refresh is running, within
//! the debounce interval of the previous refresh, and within the quiet period
//! after the last local edit.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Refresh throttler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshThrottlerConfig {
    /// Minimum spacing between two refreshes
    #[serde(with = "crate::config::duration_millis")]
    pub min_refresh_interval: Duration,
    /// Grace window after a local edit during which refreshes are refused
    #[serde(with = "crate::config::duration_millis")]
    pub quiet_period: Duration,
}

impl Default for RefreshThrottlerConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval: Duration::from_millis(500),
            quiet_period: Duration::from_millis(2000),
        }
    }
}

/// Per-session refresh bookkeeping. Discard (or [`reset`](Self::reset)) when
/// the editing session ends.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    last_refresh: Option<Instant>,
    last_direct_edit: Option<Instant>,
    refresh_in_flight: bool,
    direct_edit_in_flight: bool,
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn last_direct_edit(&self) -> Option<Instant> {
        self.last_direct_edit
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.refresh_in_flight
    }

    pub fn direct_edit_in_flight(&self) -> bool {
        self.direct_edit_in_flight
    }

    /// A local edit is being written into the live document
    pub fn begin_direct_edit(&mut self) {
        self.direct_edit_in_flight = true;
    }

    /// The local edit landed at `now`; the quiet period starts here
    pub fn finish_direct_edit(&mut self, now: Instant) {
        self.direct_edit_in_flight = false;
        self.last_direct_edit = Some(now);
    }

    /// The local edit was cancelled before it landed; no quiet period starts
    pub fn abort_direct_edit(&mut self) {
        self.direct_edit_in_flight = false;
    }

    /// Clear the in-flight flag once a refresh completes, successfully or not
    pub fn finish_refresh(&mut self) {
        self.refresh_in_flight = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Allowed,
    /// Refused: the document is in edit mode
    Editing,
    DirectEditInFlight,
    RefreshInFlight,
    Debounced { retry_after: Duration },
    QuietPeriod { retry_after: Duration },
}

impl RefreshDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, RefreshDecision::Allowed)
    }
}

/// Cooperative refresh rate limiter
#[derive(Debug, Clone, Default)]
pub struct RefreshThrottler {
    config: RefreshThrottlerConfig,
}

impl RefreshThrottler {
    pub fn new(config: RefreshThrottlerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefreshThrottlerConfig {
        &self.config
    }

    /// Decide without touching `state`
    pub fn evaluate(&self, state: &RefreshState, now: Instant) -> RefreshDecision {
        if state.direct_edit_in_flight {
            return RefreshDecision::DirectEditInFlight;
        }
        if state.refresh_in_flight {
            return RefreshDecision::RefreshInFlight;
        }
        if let Some(last) = state.last_refresh {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.min_refresh_interval {
                return RefreshDecision::Debounced {
                    retry_after: self.config.min_refresh_interval - elapsed,
                };
            }
        }
        if let Some(last) = state.last_direct_edit {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.quiet_period {
                return RefreshDecision::QuietPeriod {
                    retry_after: self.config.quiet_period - elapsed,
                };
            }
        }
        RefreshDecision::Allowed
    }

    /// Claim a refresh slot. On success `state` records the refresh as in
    /// flight at `now`; the caller clears it with
    /// [`RefreshState::finish_refresh`].
    pub fn try_refresh(&self, state: &mut RefreshState, now: Instant) -> bool {
        self.try_claim(state, now).is_allowed()
    }

    /// [`try_refresh`](Self::try_refresh) reporting why a refresh was refused
    pub fn try_claim(&self, state: &mut RefreshState, now: Instant) -> RefreshDecision {
        let decision = self.evaluate(state, now);
        if decision.is_allowed() {
            state.refresh_in_flight = true;
            state.last_refresh = Some(now);
        } else {
            debug!(?decision, "Refresh refused");
        }
        decision
    }
}
