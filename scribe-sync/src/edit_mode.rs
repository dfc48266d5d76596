//! Viewing/Editing state machine
//!
//! While editing, refreshes are refused outright. Leaving edit mode reapplies
//! the last persisted snapshot, if one is pending, exactly once.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::document::Document;
use crate::refresh::{RefreshDecision, RefreshState, RefreshThrottler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Viewing,
    Editing,
}

/// Edit session state: current mode plus the pending saved snapshot
#[derive(Debug, Clone, Default)]
pub struct EditModeController {
    mode: EditMode,
    last_saved_snapshot: Option<Document>,
}

impl EditModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == EditMode::Editing
    }

    pub fn has_pending_snapshot(&self) -> bool {
        self.last_saved_snapshot.is_some()
    }

    /// Viewing to Editing. Always allowed.
    pub fn enter_editing(&mut self) {
        if self.mode != EditMode::Editing {
            debug!("Entering edit mode");
        }
        self.mode = EditMode::Editing;
    }

    /// Editing to Viewing. A pending snapshot replaces `live` and is consumed.
    ///
    /// Returns true if a snapshot was applied. Re-entering Viewing from
    /// Viewing is a no-op.
    pub fn enter_viewing(&mut self, live: &mut Document) -> bool {
        if self.mode == EditMode::Viewing {
            return false;
        }
        self.mode = EditMode::Viewing;

        match self.last_saved_snapshot.take() {
            Some(snapshot) => {
                *live = snapshot;
                info!(sections = live.len(), "Applied last saved snapshot on leaving edit mode");
                true
            }
            None => false,
        }
    }

    /// Record the content of a successful save as the snapshot to reapply
    pub fn record_saved(&mut self, saved: &Document) {
        self.last_saved_snapshot = Some(saved.snapshot());
    }

    /// Forget the pending snapshot; newer data has replaced the live document
    pub fn discard_snapshot(&mut self) -> bool {
        self.last_saved_snapshot.take().is_some()
    }

    /// Gate a refresh request: refused in edit mode regardless of timing,
    /// otherwise decided by the throttler
    pub fn try_refresh(
        &self,
        throttler: &RefreshThrottler,
        state: &mut RefreshState,
        now: Instant,
    ) -> RefreshDecision {
        if self.is_editing() {
            debug!("Refresh refused in edit mode");
            return RefreshDecision::Editing;
        }
        throttler.try_claim(state, now)
    }
}
