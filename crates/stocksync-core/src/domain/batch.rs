//! Batch operations - accumulator に積まれる書き込み要求

use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::Fields;
use super::errors::SyncError;
use super::ids::DocumentId;

/// Kind of a buffered write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One write request waiting in the accumulator.
///
/// Every operation names its target collection explicitly. `id` is required
/// for Update and Delete and ignored for Create; use the constructors to get
/// a well-formed value, `validate` catches hand-built ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    pub kind: OperationKind,
    pub collection: String,
    pub payload: Fields,
    pub id: Option<DocumentId>,
}

impl BatchOperation {
    pub fn create(collection: impl Into<String>, payload: Fields) -> Self {
        Self {
            kind: OperationKind::Create,
            collection: collection.into(),
            payload,
            id: None,
        }
    }

    pub fn update(collection: impl Into<String>, id: impl Into<DocumentId>, payload: Fields) -> Self {
        Self {
            kind: OperationKind::Update,
            collection: collection.into(),
            payload,
            id: Some(id.into()),
        }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection: collection.into(),
            payload: Fields::new(),
            id: Some(id.into()),
        }
    }

    /// Reject operations that cannot be addressed.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.collection.trim().is_empty() {
            return Err(SyncError::EmptyCollection);
        }
        match (self.kind, &self.id) {
            (OperationKind::Update | OperationKind::Delete, None) => {
                Err(SyncError::MissingDocumentId {
                    kind: self.kind,
                    collection: self.collection.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Convert into the store-level write. Call `validate` first.
    pub(crate) fn into_write(self) -> Result<WriteOp, SyncError> {
        self.validate()?;
        let write = match (self.kind, self.id) {
            (OperationKind::Create, _) => WriteOp::Create {
                collection: self.collection,
                fields: self.payload,
            },
            (OperationKind::Update, Some(id)) => WriteOp::Update {
                collection: self.collection,
                id,
                fields: self.payload,
            },
            (OperationKind::Delete, Some(id)) => WriteOp::Delete {
                collection: self.collection,
                id,
            },
            (kind, None) => {
                return Err(SyncError::MissingDocumentId {
                    kind,
                    collection: self.collection,
                });
            }
        };
        Ok(write)
    }
}

/// A single write inside an atomic store commit.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { collection: String, fields: Fields },
    Update { collection: String, id: DocumentId, fields: Fields },
    Delete { collection: String, id: DocumentId },
}

impl WriteOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            WriteOp::Create { .. } => OperationKind::Create,
            WriteOp::Update { .. } => OperationKind::Update,
            WriteOp::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }
}
