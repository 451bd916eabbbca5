//! Durable record of which files were delivered, when, and in which message.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::Sidecar;

/// Per-file delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    #[serde(rename = "upload_date")]
    pub delivered_at: DateTime<Utc>,
    /// Correlation id of the message the file went out in. Legacy entries may lack one.
    #[serde(rename = "message_id", default)]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub size_bytes: u64,
}

impl DeliveryRecord {
    pub fn new(
        delivered_at: DateTime<Utc>,
        correlation_id: impl Into<String>,
        size_bytes: u64,
        sidecar: Option<Sidecar>,
    ) -> Self {
        let sidecar = sidecar.unwrap_or_default();
        Self {
            delivered_at,
            correlation_id: Some(correlation_id.into()),
            caption: sidecar.caption,
            tags: sidecar.tags,
            size_bytes,
        }
    }
}

/// The upload history file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLedger {
    #[serde(rename = "uploaded_files", default)]
    pub delivered: BTreeSet<String>,
    #[serde(rename = "metadata", default)]
    pub records: BTreeMap<String, DeliveryRecord>,
}

/// The files that went out together in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBatch {
    pub correlation_id: String,
    pub delivered_at: DateTime<Utc>,
    pub filenames: Vec<String>,
}

impl UploadLedger {
    pub fn is_delivered(&self, filename: &str) -> bool {
        self.delivered.contains(filename)
    }

    /// Snapshot of delivered filenames, for excluding them from a scan.
    pub fn delivered_set(&self) -> HashSet<String> {
        self.delivered.iter().cloned().collect()
    }

    pub fn record(&mut self, filename: impl Into<String>, record: DeliveryRecord) {
        let filename = filename.into();
        self.delivered.insert(filename.clone());
        self.records.insert(filename, record);
    }

    /// Forget a file entirely. Returns its record if it had one.
    pub fn forget(&mut self, filename: &str) -> Option<DeliveryRecord> {
        self.delivered.remove(filename);
        self.records.remove(filename)
    }

    /// Drop everything. Returns how many delivered filenames were forgotten.
    pub fn clear(&mut self) -> usize {
        let n = self.delivered.len();
        self.delivered.clear();
        self.records.clear();
        n
    }

    /// The most recently delivered batch, grouped retroactively by correlation id.
    pub fn latest_batch(&self) -> Option<DeliveredBatch> {
        let (correlation_id, delivered_at) = self
            .records
            .values()
            .filter_map(|r| r.correlation_id.as_ref().map(|id| (id, r.delivered_at)))
            .max_by_key(|(_, at)| *at)?;

        let filenames = self
            .records
            .iter()
            .filter(|(_, r)| r.correlation_id.as_ref() == Some(correlation_id))
            .map(|(name, _)| name.clone())
            .collect();

        Some(DeliveredBatch {
            correlation_id: correlation_id.clone(),
            delivered_at,
            filenames,
        })
    }

    /// Records delivered at or after `since`, newest first.
    pub fn delivered_since(&self, since: DateTime<Utc>) -> Vec<(&String, &DeliveryRecord)> {
        let mut recent: Vec<_> = self
            .records
            .iter()
            .filter(|(_, r)| r.delivered_at >= since)
            .collect();
        recent.sort_by(|a, b| b.1.delivered_at.cmp(&a.1.delivered_at));
        recent
    }
}
