//! Run state machine for bulk operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of one bulk run.
///
/// State transitions:
/// - Pending -> Processing -> Completed (no item failed)
/// - Pending -> Processing -> Failed (at least one item failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    /// Registered, no item started yet.
    Pending,

    /// Items are being processed.
    Processing,

    /// Every item succeeded.
    Completed,

    /// At least one item failed (others may have succeeded).
    Failed,
}

impl BulkStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, BulkStatus::Completed | BulkStatus::Failed)
    }
}

impl fmt::Display for BulkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BulkStatus::Pending => "pending",
            BulkStatus::Processing => "processing",
            BulkStatus::Completed => "completed",
            BulkStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Label of a bulk run. All kinds share the same control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkKind {
    Create,
    Update,
    Delete,
    Import,
    Export,
}

impl fmt::Display for BulkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BulkKind::Create => "create",
            BulkKind::Update => "update",
            BulkKind::Delete => "delete",
            BulkKind::Import => "import",
            BulkKind::Export => "export",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BulkStatus::Pending, false)]
    #[case(BulkStatus::Processing, false)]
    #[case(BulkStatus::Completed, true)]
    #[case(BulkStatus::Failed, true)]
    fn terminal_states(#[case] status: BulkStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&BulkStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(serde_json::to_string(&BulkKind::Import).unwrap(), "\"import\"");
        assert_eq!(BulkKind::Export.to_string(), "export");
    }
}
