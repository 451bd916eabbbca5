//! Reverse the most recently delivered batch.
//!
//! A batch is every delivery record sharing the newest correlation id. Undo is
//! fail-closed: unless every file of that batch is still in the archive and its name is
//! free in the pending folder, nothing is deleted, moved or forgotten.

use tracing::{error, info, warn};

use crate::contract::{CorrelationId, DeliveryChannel, DeliveryError};
use crate::coordinator::UploadCoordinator;
use crate::error::{BatchError, BatchResult, FileFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoReport {
    NothingToUndo,
    Undone {
        correlation_id: CorrelationId,
        restored: Vec<String>,
        failed: Vec<FileFailure>,
    },
}

impl UndoReport {
    pub fn restored_count(&self) -> usize {
        match self {
            UndoReport::NothingToUndo => 0,
            UndoReport::Undone { restored, .. } => restored.len(),
        }
    }
}

impl<C> UploadCoordinator<C>
where
    C: DeliveryChannel,
{
    /// Undo the latest batch: delete its message, move its files back to pending and
    /// drop their delivery and vote records.
    pub async fn undo_last(&self) -> BatchResult<UndoReport> {
        let _guard = self.try_exclusive()?;

        let ledger = self.uploads().load().await?;
        let Some(batch) = ledger.latest_batch() else {
            info!("[UNDO] Nothing to undo");
            return Ok(UndoReport::NothingToUndo);
        };
        let correlation_id = batch.correlation_id;
        info!(correlation_id = %correlation_id, files = batch.filenames.len(), "[UNDO] Undoing latest batch");

        let missing: Vec<String> = batch
            .filenames
            .iter()
            .filter(|name| !self.catalog().is_archived(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            error!(correlation_id = %correlation_id, ?missing, "[UNDO][ERROR] Archived files missing, aborting");
            return Err(BatchError::MissingArchiveFile {
                correlation_id,
                missing,
            });
        }

        let conflicting: Vec<String> = batch
            .filenames
            .iter()
            .filter(|name| self.catalog().is_pending(name))
            .cloned()
            .collect();
        if !conflicting.is_empty() {
            error!(correlation_id = %correlation_id, ?conflicting, "[UNDO][ERROR] Pending folder already holds these names, aborting");
            return Err(BatchError::RestoreConflict {
                correlation_id,
                conflicting,
            });
        }

        let timeout = self.settings().delivery_timeout;
        let deleted = match tokio::time::timeout(timeout, self.channel().delete_message(&correlation_id)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Other(format!(
                "message deletion timed out after {}s",
                timeout.as_secs()
            ))),
        };
        match deleted {
            Ok(()) => info!(correlation_id = %correlation_id, "[UNDO] Deleted message"),
            Err(DeliveryError::NotFound(msg)) => {
                warn!(correlation_id = %correlation_id, reason = %msg, "[UNDO] Message already gone")
            }
            Err(e) => {
                error!(correlation_id = %correlation_id, error = %e, "[UNDO][ERROR] Could not delete message");
                return Err(e.into());
            }
        }

        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for filename in batch.filenames {
            match self.catalog().restore(&filename) {
                Ok(()) => restored.push(filename),
                Err(e) => {
                    error!(file = %filename, error = %e, "[UNDO][ERROR] Failed to restore file");
                    failed.push(FileFailure::new(filename, e));
                }
            }
        }

        // Only restored files leave the ledgers; a file stuck in the archive keeps its record.
        let forget_uploads = self.uploads().update(|ledger| {
            for name in &restored {
                ledger.forget(name);
            }
        });
        let forget_votes = self.ratings().update(|ratings| {
            for name in &restored {
                ratings.remove(name);
            }
        });
        let (uploads_saved, votes_saved) = futures::join!(forget_uploads, forget_votes);
        uploads_saved?;
        votes_saved?;

        info!(
            correlation_id = %correlation_id,
            restored = restored.len(),
            failed = failed.len(),
            "[UNDO] Undo complete"
        );
        Ok(UndoReport::Undone {
            correlation_id,
            restored,
            failed,
        })
    }
}
