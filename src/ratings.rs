//! Per-file vote counters, one vote per distinct voter.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ledger::UploadLedger;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub votes: u64,
    pub voters: BTreeSet<String>,
}

// `votes` is always derived from the voter set, whatever the file claims.
impl<'de> Deserialize<'de> for VoteRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            voters: BTreeSet<String>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(VoteRecord {
            votes: raw.voters.len() as u64,
            voters: raw.voters,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopEntry {
    pub filename: String,
    pub votes: u64,
    pub distinct_voters: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingLedger {
    pub files: BTreeMap<String, VoteRecord>,
}

impl RatingLedger {
    /// Count a vote. Returns `false` when this voter already voted for the file.
    pub fn record_vote(&mut self, filename: &str, voter: &str) -> bool {
        let record = self.files.entry(filename.to_string()).or_default();
        if !record.voters.insert(voter.to_string()) {
            return false;
        }
        record.votes += 1;
        true
    }

    pub fn votes_for(&self, filename: &str) -> u64 {
        self.files.get(filename).map_or(0, |r| r.votes)
    }

    pub fn remove(&mut self, filename: &str) -> Option<VoteRecord> {
        self.files.remove(filename)
    }

    pub fn total_votes(&self) -> u64 {
        self.files.values().map(|r| r.votes).sum()
    }

    /// Most-voted files among those delivered at or after `since`.
    ///
    /// Equal vote counts keep filename order.
    pub fn top_by_recency(&self, uploads: &UploadLedger, since: DateTime<Utc>, limit: usize) -> Vec<TopEntry> {
        let mut entries: Vec<TopEntry> = self
            .files
            .iter()
            .filter(|(name, _)| {
                uploads
                    .records
                    .get(name.as_str())
                    .is_some_and(|r| r.delivered_at >= since)
            })
            .map(|(name, r)| TopEntry {
                filename: name.clone(),
                votes: r.votes,
                distinct_voters: r.voters.len(),
            })
            .collect();
        entries.sort_by(|a, b| b.votes.cmp(&a.votes));
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DeliveryRecord;
    use chrono::Duration;

    #[test]
    fn repeated_votes_from_one_voter_count_once() {
        let mut ratings = RatingLedger::default();
        assert!(ratings.record_vote("a.png", "alice"));
        assert!(!ratings.record_vote("a.png", "alice"));
        assert!(ratings.record_vote("a.png", "bob"));

        let r = &ratings.files["a.png"];
        assert_eq!(r.votes, 2);
        assert_eq!(r.votes as usize, r.voters.len());
    }

    #[test]
    fn top_by_recency_filters_sorts_and_truncates() {
        let now = Utc::now();
        let mut uploads = UploadLedger::default();
        uploads.record("old.png", DeliveryRecord::new(now - Duration::days(10), "m0", 1, None));
        uploads.record("a.png", DeliveryRecord::new(now, "m1", 1, None));
        uploads.record("b.png", DeliveryRecord::new(now, "m1", 1, None));
        uploads.record("c.png", DeliveryRecord::new(now, "m1", 1, None));

        let mut ratings = RatingLedger::default();
        for voter in ["u1", "u2", "u3", "u4"] {
            ratings.record_vote("old.png", voter);
        }
        ratings.record_vote("a.png", "u1");
        ratings.record_vote("b.png", "u1");
        ratings.record_vote("b.png", "u2");
        ratings.record_vote("c.png", "u3");
        ratings.record_vote("never-delivered.png", "u1");

        let top = ratings.top_by_recency(&uploads, now - Duration::days(7), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].filename, "b.png");
        assert_eq!(top[0].votes, 2);
        assert_eq!(top[1].filename, "a.png");
    }

    #[test]
    fn vote_count_is_rederived_from_voters_on_load() {
        let ratings: RatingLedger =
            serde_json::from_str(r#"{"a.png": {"votes": 9, "voters": ["x", "y"]}}"#).unwrap();
        assert_eq!(ratings.votes_for("a.png"), 2);
    }
}
