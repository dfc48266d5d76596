//! Fire-and-forget, single-flight persistence of notes
//!
//! At most one save per document id is in flight. A save requested while
//! another is running for the same id is dropped, not queued: the running
//! save is taken to be close enough to the latest state. Completion is
//! reported on a broadcast channel, never through the return value.

use dashmap::DashSet;
use logger_redacted::PiiRedactor;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::PersistenceError;
use crate::identifier::{IdentifierReconciler, StableIdentifier};
use crate::store::{DocumentRecord, DocumentStore};

/// Completion notifications
#[derive(Debug, Clone)]
pub enum PersistenceEvent {
    /// The store accepted the write. `snapshot` is a copy of what was
    /// written, the candidate for the session's last saved snapshot.
    Saved {
        document_id: StableIdentifier,
        snapshot: Document,
        record: DocumentRecord,
    },
    /// The write failed. The live document stays as it is on screen.
    Failed {
        document_id: StableIdentifier,
        message: String,
    },
    /// A save was requested while one was already running for this id
    Dropped { document_id: StableIdentifier },
}

impl PersistenceEvent {
    pub fn document_id(&self) -> &StableIdentifier {
        match self {
            PersistenceEvent::Saved { document_id, .. }
            | PersistenceEvent::Failed { document_id, .. }
            | PersistenceEvent::Dropped { document_id } => document_id,
        }
    }
}

/// What `save` did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDispatch {
    Started,
    Dropped,
}

/// Holds a document's single-flight slot; released on drop, including
/// when the save task unwinds
struct InFlightSlot {
    in_flight: Arc<DashSet<StableIdentifier>>,
    document_id: StableIdentifier,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.in_flight.remove(&self.document_id);
    }
}

pub struct PersistenceCoordinator {
    store: Arc<dyn DocumentStore>,
    reconciler: IdentifierReconciler,
    in_flight: Arc<DashSet<StableIdentifier>>,
    events: broadcast::Sender<PersistenceEvent>,
    redactor: Arc<PiiRedactor>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, notification_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(notification_capacity.max(1));
        Self {
            store,
            reconciler: IdentifierReconciler::default(),
            in_flight: Arc::new(DashSet::new()),
            events,
            redactor: Arc::new(PiiRedactor::default()),
        }
    }

    pub fn with_reconciler(mut self, reconciler: IdentifierReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn reconciler(&self) -> &IdentifierReconciler {
        &self.reconciler
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Receive completion notifications for saves dispatched after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.events.subscribe()
    }

    pub fn is_in_flight(&self, document_id: &StableIdentifier) -> bool {
        self.in_flight.contains(document_id)
    }

    /// Save a copy of `document` under the stable form of `raw_id`.
    ///
    /// Returns immediately; the write runs on the Tokio runtime and reports
    /// through [`subscribe`](Self::subscribe). Superseded saves are not
    /// cancelled.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::InvalidDocumentId`] for an empty id, and
    /// [`PersistenceError::NoRuntime`] when called outside a Tokio runtime.
    pub fn save(&self, raw_id: &str, document: &Document) -> Result<SaveDispatch, PersistenceError> {
        let document_id = self.reconciler.ensure_stable(raw_id)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PersistenceError::NoRuntime(e.to_string()))?;

        if !self.in_flight.insert(document_id.clone()) {
            debug!(document_id = %document_id, "Save already in flight, dropping request");
            let _ = self.events.send(PersistenceEvent::Dropped { document_id });
            return Ok(SaveDispatch::Dropped);
        }

        let snapshot = document.snapshot();
        let store = Arc::clone(&self.store);
        let slot = InFlightSlot {
            in_flight: Arc::clone(&self.in_flight),
            document_id: document_id.clone(),
        };
        let events = self.events.clone();
        let redactor = Arc::clone(&self.redactor);

        runtime.spawn(async move {
            // A panicking store surfaces here as a JoinError
            let write = {
                let document_id = document_id.clone();
                let snapshot = snapshot.snapshot();
                tokio::spawn(async move { store.put(&document_id, &snapshot).await })
            };
            let outcome = write.await;
            drop(slot);

            let failure = match outcome {
                Ok(Ok(record)) => {
                    info!(document_id = %document_id, version = record.version, "Note saved");
                    let _ = events.send(PersistenceEvent::Saved {
                        document_id,
                        snapshot,
                        record,
                    });
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("store write aborted: {e}"),
            };

            let message = redactor.redact(&failure);
            warn!(
                document_id = %document_id,
                error = %message,
                "Saved on screen, not in store"
            );
            // No subscribers is fine: nobody asked to hear about it
            let _ = events.send(PersistenceEvent::Failed {
                document_id,
                message,
            });
        });

        Ok(SaveDispatch::Started)
    }
}
