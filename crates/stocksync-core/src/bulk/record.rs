//! Run record: status, progress and errors of one bulk run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BulkKind, BulkStatus};
use crate::domain::RunId;

/// Mutable record of one bulk run, kept in the service registry.
///
/// Design:
/// - The registry entry is the single source of truth for a run.
/// - All state transitions happen through the methods below.
/// - `items` is a JSON snapshot of the input, taken at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    pub id: RunId,
    pub kind: BulkKind,
    pub items: Vec<Value>,
    pub status: BulkStatus,

    /// 0..=100
    pub progress: u8,
    pub total: usize,

    /// Items finished so far (success or failure).
    pub processed: usize,
    pub errors: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkOperation {
    pub fn new(id: RunId, kind: BulkKind, items: Vec<Value>, created_at: DateTime<Utc>) -> Self {
        let total = items.len();
        Self {
            id,
            kind,
            items,
            status: BulkStatus::Pending,
            progress: 0,
            total,
            processed: 0,
            errors: Vec::new(),
            created_at,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = BulkStatus::Processing;
    }

    /// Record one finished item and recompute progress.
    pub fn record_item(&mut self, error: Option<String>) {
        if let Some(error) = error {
            self.errors.push(error);
        }
        self.processed += 1;
        self.progress = percent(self.processed, self.total);
    }

    /// Terminal status: Completed iff no item failed.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.status = if self.errors.is_empty() {
            BulkStatus::Completed
        } else {
            BulkStatus::Failed
        };
        if self.total == 0 {
            self.progress = 100;
        }
        self.completed_at = Some(at);
    }
}

/// `round(done / total * 100)`
pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
