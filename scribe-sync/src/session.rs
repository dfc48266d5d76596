//! One open note on the editing surface
//!
//! The session is the single writer of the live document. Saves, refreshes
//! and mode changes all go through it, so the cooperative flags in
//! [`RefreshState`] and the [`EditMode`] are enough to keep them apart.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::edit_mode::{EditMode, EditModeController};
use crate::error::{IdentifierError, PersistenceError};
use crate::identifier::StableIdentifier;
use crate::persistence::{PersistenceCoordinator, PersistenceEvent, SaveDispatch};
use crate::refresh::{RefreshDecision, RefreshState, RefreshThrottler};

pub struct EditingSession {
    raw_id: String,
    document_id: StableIdentifier,
    live: Document,
    controller: EditModeController,
    refresh_state: RefreshState,
    throttler: RefreshThrottler,
    persistence: Arc<PersistenceCoordinator>,
}

impl EditingSession {
    /// Open a session on `document`, keyed by the stable form of `raw_id`
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidInput`] for an empty id.
    pub fn open(
        raw_id: impl Into<String>,
        document: Document,
        persistence: Arc<PersistenceCoordinator>,
        throttler: RefreshThrottler,
    ) -> Result<Self, IdentifierError> {
        let raw_id = raw_id.into();
        let document_id = persistence.reconciler().ensure_stable(&raw_id)?;
        debug!(document_id = %document_id, "Opened editing session");

        Ok(Self {
            raw_id,
            document_id,
            live: document,
            controller: EditModeController::new(),
            refresh_state: RefreshState::new(),
            throttler,
            persistence,
        })
    }

    pub fn raw_id(&self) -> &str {
        &self.raw_id
    }

    pub fn document_id(&self) -> &StableIdentifier {
        &self.document_id
    }

    /// The live document as currently shown
    pub fn document(&self) -> &Document {
        &self.live
    }

    pub fn mode(&self) -> EditMode {
        self.controller.mode()
    }

    pub fn refresh_state(&self) -> &RefreshState {
        &self.refresh_state
    }

    pub fn has_pending_snapshot(&self) -> bool {
        self.controller.has_pending_snapshot()
    }

    pub fn begin_editing(&mut self) {
        self.controller.enter_editing();
    }

    /// Leave edit mode; returns true if the last saved snapshot replaced the
    /// live document
    pub fn finish_editing(&mut self) -> bool {
        self.controller.enter_viewing(&mut self.live)
    }

    /// Mark a keystroke commit as under way; refreshes are refused until
    /// [`commit_direct_edit`](Self::commit_direct_edit)
    pub fn begin_direct_edit(&mut self) {
        self.refresh_state.begin_direct_edit();
    }

    /// Cancel a keystroke commit started with
    /// [`begin_direct_edit`](Self::begin_direct_edit)
    pub fn abort_direct_edit(&mut self) {
        self.refresh_state.abort_direct_edit();
    }

    /// Write `text` into `section` of the live document at `now`
    pub fn commit_direct_edit(&mut self, section: &str, text: impl Into<String>, now: Instant) {
        self.refresh_state.begin_direct_edit();
        self.live.set_section(section, text);
        self.refresh_state.finish_direct_edit(now);
    }

    /// Persist a copy of the live document. Returns without waiting.
    ///
    /// # Errors
    ///
    /// See [`PersistenceCoordinator::save`].
    pub fn save(&self) -> Result<SaveDispatch, PersistenceError> {
        self.persistence.save(&self.raw_id, &self.live)
    }

    /// Feed a persistence notification to the session. Events for other
    /// documents are ignored; returns whether this one was relevant.
    pub fn handle_persistence_event(&mut self, event: &PersistenceEvent) -> bool {
        if event.document_id() != &self.document_id {
            return false;
        }

        match event {
            PersistenceEvent::Saved { snapshot, record, .. } => {
                self.controller.record_saved(snapshot);
                debug!(document_id = %self.document_id, version = record.version, "Recorded saved snapshot");
            }
            PersistenceEvent::Failed { message, .. } => {
                warn!(
                    document_id = %self.document_id,
                    error = %message,
                    "Note kept on screen but not stored"
                );
            }
            PersistenceEvent::Dropped { .. } => {
                debug!(document_id = %self.document_id, "Save request dropped, earlier save still running");
            }
        }
        true
    }

    /// Ask to start a refresh at `now`
    pub fn try_begin_refresh(&mut self, now: Instant) -> RefreshDecision {
        self.controller
            .try_refresh(&self.throttler, &mut self.refresh_state, now)
    }

    /// Complete a refresh with fresh server data.
    ///
    /// The data replaces the live document only if a refresh was claimed and
    /// nothing started editing since; either way the refresh is over.
    /// An applied refresh supersedes any pending saved snapshot.
    /// Returns whether the live document was replaced.
    pub fn apply_refresh(&mut self, refreshed: &Document) -> bool {
        if !self.refresh_state.refresh_in_flight() {
            debug!(document_id = %self.document_id, "Ignoring refresh data without a claimed refresh");
            return false;
        }

        let applicable = !self.controller.is_editing() && !self.refresh_state.direct_edit_in_flight();
        if applicable {
            self.live = refreshed.snapshot();
            if self.controller.discard_snapshot() {
                debug!(document_id = %self.document_id, "Refresh superseded pending saved snapshot");
            }
            info!(document_id = %self.document_id, "Applied refreshed note");
        } else {
            debug!(document_id = %self.document_id, "Discarding refresh that raced a local edit");
        }

        self.refresh_state.finish_refresh();
        applicable
    }

    /// A claimed refresh failed
    pub fn abort_refresh(&mut self) {
        self.refresh_state.finish_refresh();
    }

    /// End the session, discarding refresh bookkeeping. Returns the live
    /// document.
    pub fn close(mut self) -> Document {
        self.refresh_state.reset();
        debug!(document_id = %self.document_id, "Closed editing session");
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use std::time::Duration;

    fn session(raw_id: &str, doc: Document) -> EditingSession {
        let coordinator = Arc::new(PersistenceCoordinator::new(
            Arc::new(MemoryDocumentStore::new()),
            16,
        ));
        EditingSession::open(raw_id, doc, coordinator, RefreshThrottler::default()).unwrap()
    }

    #[test]
    fn test_open_rejects_empty_id() {
        let coordinator = Arc::new(PersistenceCoordinator::new(
            Arc::new(MemoryDocumentStore::new()),
            16,
        ));
        assert!(EditingSession::open("", Document::new(), coordinator, RefreshThrottler::default()).is_err());
    }

    #[test]
    fn test_refresh_blocked_while_editing_and_after_edit() {
        let mut session = session("visit-1", Document::from_iter([("plan", "rest")]));
        let t0 = Instant::now();

        session.begin_editing();
        session.commit_direct_edit("plan", "rest and fluids", t0);
        assert_eq!(session.try_begin_refresh(t0 + Duration::from_secs(10)), RefreshDecision::Editing);

        session.finish_editing();
        assert!(matches!(
            session.try_begin_refresh(t0 + Duration::from_millis(500)),
            RefreshDecision::QuietPeriod { .. }
        ));
        assert!(session.try_begin_refresh(t0 + Duration::from_secs(3)).is_allowed());
    }

    #[test]
    fn test_apply_refresh_requires_claim() {
        let mut session = session("visit-2", Document::from_iter([("plan", "rest")]));
        let server = Document::from_iter([("plan", "from server")]);

        assert!(!session.apply_refresh(&server));
        assert_eq!(session.document().section("plan"), Some("rest"));

        assert!(session.try_begin_refresh(Instant::now()).is_allowed());
        assert!(session.apply_refresh(&server));
        assert_eq!(session.document().section("plan"), Some("from server"));
        assert!(!session.refresh_state().refresh_in_flight());
    }

    #[test]
    fn test_refresh_landing_after_edit_started_is_discarded() {
        let mut session = session("visit-3", Document::from_iter([("plan", "rest")]));

        assert!(session.try_begin_refresh(Instant::now()).is_allowed());
        session.begin_editing();
        session.commit_direct_edit("plan", "typed while loading", Instant::now());

        assert!(!session.apply_refresh(&Document::from_iter([("plan", "stale")])));
        assert_eq!(session.document().section("plan"), Some("typed while loading"));
        assert!(!session.refresh_state().refresh_in_flight());
    }

    #[test]
    fn test_aborted_direct_edit_does_not_block_refresh() {
        let mut session = session("visit-7", Document::from_iter([("plan", "rest")]));
        let t0 = Instant::now();

        session.begin_direct_edit();
        assert_eq!(session.try_begin_refresh(t0), RefreshDecision::DirectEditInFlight);

        session.abort_direct_edit();
        assert!(session.try_begin_refresh(t0).is_allowed());
        assert_eq!(session.document().section("plan"), Some("rest"));
    }

    #[test]
    fn test_applied_refresh_supersedes_saved_snapshot() {
        let mut session = session("visit-8", Document::from_iter([("plan", "draft")]));
        let t0 = Instant::now();

        session.begin_editing();
        session.commit_direct_edit("plan", "saved plan", t0);
        session.finish_editing();

        // Save completes after the user already left edit mode
        let saved = PersistenceEvent::Saved {
            document_id: session.document_id().clone(),
            snapshot: Document::from_iter([("plan", "saved plan")]),
            record: crate::store::DocumentRecord {
                key: session.document_id().clone(),
                document: Document::from_iter([("plan", "saved plan")]),
                version: 1,
                updated_at: chrono::Utc::now(),
            },
        };
        assert!(session.handle_persistence_event(&saved));
        assert!(session.has_pending_snapshot());

        let later = t0 + Duration::from_secs(5);
        assert!(session.try_begin_refresh(later).is_allowed());
        assert!(session.apply_refresh(&Document::from_iter([("plan", "cosigned plan")])));
        assert!(!session.has_pending_snapshot());

        session.begin_editing();
        assert!(!session.finish_editing());
        assert_eq!(session.document().section("plan"), Some("cosigned plan"));
    }

    #[test]
    fn test_abort_refresh_clears_flag() {
        let mut session = session("visit-4", Document::new());
        let t0 = Instant::now();
        assert!(session.try_begin_refresh(t0).is_allowed());
        assert_eq!(
            session.try_begin_refresh(t0 + Duration::from_secs(1)),
            RefreshDecision::RefreshInFlight
        );
        session.abort_refresh();
        assert!(session.try_begin_refresh(t0 + Duration::from_secs(1)).is_allowed());
    }

    #[test]
    fn test_events_for_other_documents_are_ignored() {
        let mut session = session("visit-5", Document::new());
        let other = PersistenceEvent::Dropped {
            document_id: crate::identifier::ensure_stable("visit-6").unwrap(),
        };
        assert!(!session.handle_persistence_event(&other));
    }
}
