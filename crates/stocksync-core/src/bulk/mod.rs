//! Bulk module: run state machine, run records, and the runner service.

mod record;
mod service;
mod state;

pub use record::BulkOperation;
pub use service::{
    BulkOperationResult, BulkOperationService, BulkStatistics, FailedItem, ProgressFn,
    UNKNOWN_ERROR,
};
pub use state::{BulkKind, BulkStatus};
