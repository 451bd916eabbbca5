//! One upload cycle: expire → scan → select → deliver → (degrade) → commit.
//!
//! The coordinator owns every collaborator it needs; nothing is reached through
//! global state. A cycle runs start to finish on the caller's task, and at most one
//! cycle (or undo) runs at a time: a second trigger while one is running is rejected
//! with [`BatchError::CycleInProgress`].
//!
//! # Degrade cascade
//! When the channel rejects the nominal batch as too large, the coordinator walks
//! [`DEGRADE_CASCADE`] in order. Each tier picks its own batch with a scaled byte
//! ceiling, may refuse a batch that is too small relative to the nominal one, and on
//! delivery failure hands over to the next tier.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::catalog::{FileCatalog, MediaFile, MediaKind, PendingPools};
use crate::config::{BatchConfig, OrderMode};
use crate::contract::{CorrelationId, DeliveryChannel, DeliveryError, SidecarSource};
use crate::error::{BatchError, BatchResult, FileFailure};
use crate::ledger::{DeliveryRecord, UploadLedger};
use crate::ratings::{RatingLedger, TopEntry};
use crate::select::{count_kind, select, total_size, Budget, Strategy};
use crate::sidecar::JsonSidecar;
use crate::store::JsonStore;

/// One step of the selection cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradeTier {
    pub name: &'static str,
    /// Message label; the file count is appended when sending.
    pub label: &'static str,
    pub strategy: Strategy,
    /// Multiplier applied to the nominal byte ceiling.
    pub budget_scale: f64,
    /// Minimum batch size as a fraction of the nominal batch's file count.
    pub min_accept_ratio: Option<f64>,
}

impl DegradeTier {
    /// Whether a candidate of `candidate_len` files may be sent in place of a nominal batch of `nominal_len`.
    pub fn accepts(&self, candidate_len: usize, nominal_len: usize) -> bool {
        if candidate_len == 0 {
            return false;
        }
        match self.min_accept_ratio {
            Some(ratio) => candidate_len as f64 >= nominal_len as f64 * ratio,
            None => true,
        }
    }
}

pub const NOMINAL_TIER: DegradeTier = DegradeTier {
    name: "nominal",
    label: "Daily Batch Upload",
    strategy: Strategy::Ordered,
    budget_scale: 1.0,
    min_accept_ratio: None,
};

pub const DEGRADE_CASCADE: [DegradeTier; 2] = [
    DegradeTier {
        name: "smart-fit",
        label: "Adjusted Batch Upload",
        strategy: Strategy::SmartFit,
        budget_scale: 0.8,
        min_accept_ratio: Some(0.5),
    },
    DegradeTier {
        name: "reduced",
        label: "Reduced Batch Upload",
        strategy: Strategy::Reduced,
        budget_scale: 0.6,
        min_accept_ratio: None,
    },
];

/// Knobs for a cycle, independent of where the files and ledgers live.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub budget: Budget,
    pub order: OrderMode,
    pub archive_retention: Duration,
    pub delivery_timeout: Duration,
}

impl From<&BatchConfig> for CycleSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            budget: Budget::new(
                config.images_per_batch,
                config.videos_per_batch,
                config.max_upload_bytes(),
            ),
            order: config.selection_order,
            archive_retention: config.archive_retention(),
            delivery_timeout: config.delivery_timeout,
        }
    }
}

/// A batch that went out and was archived.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub tier: &'static str,
    pub correlation_id: CorrelationId,
    pub archived: Vec<String>,
    pub images: usize,
    pub videos: usize,
    pub bytes: u64,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing in the pending pool fits the nominal budget.
    NothingToUpload,
    Delivered(CycleReport),
    /// The nominal batch was too large and no degraded batch qualified.
    Abandoned { reason: String },
}

pub struct UploadCoordinator<C> {
    settings: CycleSettings,
    catalog: FileCatalog,
    uploads: JsonStore<UploadLedger>,
    ratings: JsonStore<RatingLedger>,
    channel: C,
    sidecar: Arc<dyn SidecarSource>,
    cycle_lock: Mutex<()>,
}

impl<C> UploadCoordinator<C>
where
    C: DeliveryChannel,
{
    pub fn new(
        settings: CycleSettings,
        catalog: FileCatalog,
        uploads: JsonStore<UploadLedger>,
        ratings: JsonStore<RatingLedger>,
        channel: C,
    ) -> Self {
        Self {
            settings,
            catalog,
            uploads,
            ratings,
            channel,
            sidecar: Arc::new(JsonSidecar),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Wire up a coordinator from a loaded config.
    pub fn from_config(config: &BatchConfig, channel: C) -> Self {
        Self::new(
            CycleSettings::from(config),
            FileCatalog::new(&config.pending_dir, &config.archive_dir, config.extensions.clone()),
            JsonStore::new(&config.history_file),
            JsonStore::new(&config.ratings_file),
            channel,
        )
    }

    pub fn with_sidecar(mut self, sidecar: impl SidecarSource + 'static) -> Self {
        self.sidecar = Arc::new(sidecar);
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    pub fn uploads(&self) -> &JsonStore<UploadLedger> {
        &self.uploads
    }

    pub fn ratings(&self) -> &JsonStore<RatingLedger> {
        &self.ratings
    }

    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    /// Take the engine exclusively, or fail right away if someone else holds it.
    pub(crate) fn try_exclusive(&self) -> BatchResult<tokio::sync::MutexGuard<'_, ()>> {
        self.cycle_lock.try_lock().map_err(|_| {
            warn!("[CYCLE] Rejected: another cycle is in progress");
            BatchError::CycleInProgress
        })
    }

    /// Run one full cycle. Used by both the scheduler and manual triggers.
    pub async fn run_cycle(&self) -> BatchResult<CycleOutcome> {
        let _guard = self.try_exclusive()?;
        info!("[CYCLE] Starting upload cycle");
        let result = self.run_cycle_locked().await;
        match &result {
            Ok(CycleOutcome::Delivered(report)) => info!(
                tier = report.tier,
                correlation_id = %report.correlation_id,
                archived = report.archived.len(),
                "[CYCLE] Cycle complete"
            ),
            Ok(outcome) => info!(?outcome, "[CYCLE] Cycle ended without delivery"),
            Err(e) => error!(error = %e, "[CYCLE][ERROR] Cycle failed"),
        }
        result
    }

    async fn run_cycle_locked(&self) -> BatchResult<CycleOutcome> {
        if !self.catalog.pending_dir().is_dir() {
            return Err(BatchError::NotFound(format!(
                "pending folder {} does not exist",
                self.catalog.pending_dir().display()
            )));
        }

        let expired = self.catalog.expire_archive(self.settings.archive_retention);
        debug!(removed = expired.removed.len(), failed = expired.failed.len(), "[CYCLE] Archive expiry done");

        let ledger = self.uploads.load().await?;
        let pools = self.catalog.scan(&ledger.delivered_set());
        info!(
            images = pools.images.len(),
            videos = pools.videos.len(),
            order = %self.settings.order,
            "[CYCLE] Pending pool scanned"
        );

        let nominal = self.select_for(&NOMINAL_TIER, &pools);
        if nominal.is_empty() {
            info!("[CYCLE] No files to upload");
            return Ok(CycleOutcome::NothingToUpload);
        }

        match self.deliver(&NOMINAL_TIER, &nominal).await {
            Ok(correlation_id) => self
                .commit(&NOMINAL_TIER, correlation_id, &nominal)
                .await
                .map(CycleOutcome::Delivered),
            Err(DeliveryError::PayloadTooLarge(msg)) => {
                warn!(files = nominal.len(), reason = %msg, "[CYCLE] Batch too large, degrading");
                self.degrade(&pools, nominal.len()).await
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select_for(&self, tier: &DegradeTier, pools: &PendingPools) -> Vec<MediaFile> {
        let budget = self.settings.budget.scaled(tier.budget_scale);
        select(tier.strategy, pools, &budget, self.settings.order)
    }

    async fn degrade(&self, pools: &PendingPools, nominal_len: usize) -> BatchResult<CycleOutcome> {
        let mut last_failure: Option<DeliveryError> = None;

        for tier in DEGRADE_CASCADE.iter() {
            let batch = self.select_for(tier, pools);
            if !tier.accepts(batch.len(), nominal_len) {
                info!(
                    tier = tier.name,
                    files = batch.len(),
                    nominal = nominal_len,
                    "[CYCLE] Skipping degraded tier"
                );
                continue;
            }
            match self.deliver(tier, &batch).await {
                Ok(correlation_id) => {
                    return self
                        .commit(tier, correlation_id, &batch)
                        .await
                        .map(CycleOutcome::Delivered)
                }
                Err(e) => {
                    warn!(tier = tier.name, error = %e, "[CYCLE] Degraded delivery failed");
                    last_failure = Some(e);
                }
            }
        }

        match last_failure {
            Some(e) => Err(e.into()),
            None => Ok(CycleOutcome::Abandoned {
                reason: "no degraded batch qualified for delivery".to_string(),
            }),
        }
    }

    async fn deliver(&self, tier: &DegradeTier, batch: &[MediaFile]) -> Result<CorrelationId, DeliveryError> {
        let label = format!("{} ({} files)", tier.label, batch.len());
        info!(
            tier = tier.name,
            files = batch.len(),
            bytes = total_size(batch),
            "[CYCLE] Delivering batch"
        );
        let timeout = self.settings.delivery_timeout;
        match tokio::time::timeout(timeout, self.channel.send(batch, &label)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Other(format!(
                "delivery timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Move delivered files into the archive and record them, saving the ledger once.
    async fn commit(
        &self,
        tier: &DegradeTier,
        correlation_id: CorrelationId,
        batch: &[MediaFile],
    ) -> BatchResult<CycleReport> {
        let delivered_at = Utc::now();
        let mut records = Vec::with_capacity(batch.len());
        let mut failed = Vec::new();

        for file in batch {
            let sidecar = self.sidecar.read(&file.path);
            match self.catalog.archive(&file.filename) {
                Ok(()) => records.push((
                    file.clone(),
                    DeliveryRecord::new(delivered_at, correlation_id.clone(), file.size_bytes, sidecar),
                )),
                Err(e) => {
                    error!(file = %file.filename, error = %e, "[CYCLE][ERROR] Failed to archive delivered file");
                    failed.push(FileFailure::new(file.filename.clone(), e));
                }
            }
        }

        let archived: Vec<MediaFile> = records.iter().map(|(f, _)| f.clone()).collect();
        self.uploads
            .update(|ledger| {
                for (file, record) in records {
                    ledger.record(file.filename, record);
                }
            })
            .await?;

        if !failed.is_empty() {
            return Err(BatchError::PartialCommit {
                correlation_id,
                archived: archived.into_iter().map(|f| f.filename).collect(),
                failed,
            });
        }

        info!(tier = tier.name, files = archived.len(), "[CYCLE] Archived delivered files");
        Ok(CycleReport {
            tier: tier.name,
            correlation_id,
            images: count_kind(&archived, MediaKind::Image),
            videos: count_kind(&archived, MediaKind::Video),
            bytes: total_size(&archived),
            archived: archived.into_iter().map(|f| f.filename).collect(),
            delivered_at,
        })
    }

    /// Count a vote for a file. Does not wait for a running cycle.
    pub async fn record_vote(&self, filename: &str, voter: &str) -> BatchResult<bool> {
        let counted = self
            .ratings
            .update(|ratings| ratings.record_vote(filename, voter))
            .await?;
        debug!(file = filename, voter, counted, "Recorded vote");
        Ok(counted)
    }

    /// Most-voted files delivered at or after `since`.
    pub async fn top_rated(&self, since: DateTime<Utc>, limit: usize) -> BatchResult<Vec<TopEntry>> {
        let uploads = self.uploads.load().await?;
        let ratings = self.ratings.load().await?;
        Ok(ratings.top_by_recency(&uploads, since, limit))
    }
}
