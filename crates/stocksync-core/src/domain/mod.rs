//! Domain model (ids, documents, batch operations, inventory records, errors).

pub mod batch;
pub mod document;
pub mod errors;
pub mod ids;
pub mod inventory;

pub use self::batch::{BatchOperation, OperationKind, WriteOp};
pub use self::document::{Document, Fields, to_fields};
pub use self::errors::{ErrorKind, StoreError, SyncError};
pub use self::ids::{CommitId, DocumentId, RunId};
pub use self::inventory::{Category, Product, Record, Supplier, collections};
