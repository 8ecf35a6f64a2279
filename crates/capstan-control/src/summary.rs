//! Task summary aggregation.
//!
//! The summary answers "what happened recently": records with activity inside
//! a recent window, grouped into `(state, result)` buckets with counts.
//! Aggregation is a pure function over records; the Record Store supplies the
//! recent-activity listing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{TaskRecord, TaskResult, TaskState};

/// One `(state, result)` group of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBucket {
    /// The state shared by the bucket's records.
    pub state: TaskState,
    /// The result shared by the bucket's records; `None` for active states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// How many records fell into the bucket.
    pub count: u64,
}

/// Aggregated view of recent task activity.
///
/// Serialized as JSON for the callers that render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// Start of the activity window the summary covers.
    pub since: DateTime<Utc>,
    /// Total records counted across all buckets.
    pub total: u64,
    /// Buckets in deterministic order (state, then result).
    pub buckets: Vec<SummaryBucket>,
}

impl TaskSummary {
    /// Aggregates records into `(state, result)` buckets.
    ///
    /// The caller supplies records already filtered to the window (the store's
    /// recent-activity listing); `since` is carried for display only.
    #[must_use]
    pub fn aggregate(since: DateTime<Utc>, records: &[TaskRecord]) -> Self {
        let mut counts: BTreeMap<(&'static str, &'static str), SummaryBucket> = BTreeMap::new();
        for record in records {
            let key = (
                record.state.as_label(),
                record.result.map_or("", |result| result.as_label()),
            );
            counts
                .entry(key)
                .or_insert(SummaryBucket {
                    state: record.state,
                    result: record.result,
                    count: 0,
                })
                .count += 1;
        }

        let buckets: Vec<SummaryBucket> = counts.into_values().collect();
        let total = buckets.iter().map(|bucket| bucket.count).sum();
        Self {
            since,
            total,
            buckets,
        }
    }

    /// Serializes the summary to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a summary from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
