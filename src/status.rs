//! Read-only reports on the queue and history, plus the admin maintenance actions.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::catalog::{ExpireReport, MediaKind};
use crate::config::OrderMode;
use crate::contract::DeliveryChannel;
use crate::coordinator::{UploadCoordinator, NOMINAL_TIER};
use crate::error::BatchResult;
use crate::select::{count_kind, select, total_size};

const RECENT_WINDOW_DAYS: i64 = 7;
const RECENT_LIST_LIMIT: usize = 10;

/// What is waiting and what the next nominal batch would look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub images_ready: usize,
    pub videos_ready: usize,
    pub archived: usize,
    pub next_batch_images: usize,
    pub next_batch_videos: usize,
    pub next_batch_bytes: u64,
    pub order: OrderMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total_uploaded: usize,
    pub images_uploaded: usize,
    pub videos_uploaded: usize,
    /// Bytes still held in the archive by delivered files.
    pub storage_used_bytes: u64,
    pub rated_files: usize,
    pub total_votes: u64,
    pub recent_uploads_count: usize,
    pub recent_uploads: Vec<(String, DateTime<Utc>)>,
}

impl<C> UploadCoordinator<C>
where
    C: DeliveryChannel,
{
    /// Preview of the queue. With `random` order the previewed batch is one possible draw.
    pub async fn queue_status(&self) -> BatchResult<QueueStatus> {
        let ledger = self.uploads().load().await?;
        let pools = self.catalog().scan(&ledger.delivered_set());
        let next = select(
            NOMINAL_TIER.strategy,
            &pools,
            &self.settings().budget,
            self.settings().order,
        );
        Ok(QueueStatus {
            images_ready: pools.images.len(),
            videos_ready: pools.videos.len(),
            archived: self.catalog().archived_count(),
            next_batch_images: count_kind(&next, MediaKind::Image),
            next_batch_videos: count_kind(&next, MediaKind::Video),
            next_batch_bytes: total_size(&next),
            order: self.settings().order,
        })
    }

    pub async fn statistics(&self) -> BatchResult<Statistics> {
        self.statistics_at(Utc::now()).await
    }

    pub async fn statistics_at(&self, now: DateTime<Utc>) -> BatchResult<Statistics> {
        let ledger = self.uploads().load().await?;
        let ratings = self.ratings().load().await?;

        let kinds: Vec<Option<MediaKind>> = ledger
            .delivered
            .iter()
            .map(|name| self.catalog().classify(name))
            .collect();
        let storage_used_bytes = ledger
            .delivered
            .iter()
            .filter_map(|name| self.catalog().archived_size(name))
            .sum();
        let recent = ledger.delivered_since(now - Duration::days(RECENT_WINDOW_DAYS));

        Ok(Statistics {
            total_uploaded: ledger.delivered.len(),
            images_uploaded: kinds.iter().filter(|k| **k == Some(MediaKind::Image)).count(),
            videos_uploaded: kinds.iter().filter(|k| **k == Some(MediaKind::Video)).count(),
            storage_used_bytes,
            rated_files: ratings.files.len(),
            total_votes: ratings.total_votes(),
            recent_uploads_count: recent.len(),
            recent_uploads: recent
                .into_iter()
                .take(RECENT_LIST_LIMIT)
                .map(|(name, r)| (name.clone(), r.delivered_at))
                .collect(),
        })
    }

    /// Forget every delivery so all pending files become eligible again.
    pub async fn clear_history(&self) -> BatchResult<usize> {
        let _guard = self.try_exclusive()?;
        let dropped = self.uploads().update(|ledger| ledger.clear()).await?;
        info!(dropped, "Upload history cleared");
        Ok(dropped)
    }

    /// Delete every archive entry now, whatever its age.
    pub async fn clear_archive(&self) -> BatchResult<ExpireReport> {
        let _guard = self.try_exclusive()?;
        let report = self.catalog().purge_archive();
        info!(removed = report.removed.len(), failed = report.failed.len(), "Archive cleared");
        Ok(report)
    }

    /// Run archive expiry outside a cycle.
    pub async fn expire_archive(&self) -> BatchResult<ExpireReport> {
        let _guard = self.try_exclusive()?;
        Ok(self.catalog().expire_archive(self.settings().archive_retention))
    }
}
