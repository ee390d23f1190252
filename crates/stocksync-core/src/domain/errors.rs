//! Errors - エラー型と分類
//!
//! - `StoreError`: DocumentStore 実装が返すエラー
//! - `SyncError`: コアの各コンポーネントが呼び出し元に返すエラー
//!
//! キャッシュミスはエラーではなく `None` で表現します。
//! Bulk run の個別失敗も `BulkOperationResult::failed` に記録されるだけで、
//! ここに現れることはありません。

use thiserror::Error;

use super::batch::OperationKind;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（ネットワーク、クォータ）
/// - Permanent: 恒久的なエラー（権限、存在しないドキュメント、呼び出し側のミス）
/// - Infrastructure: ストア自体の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Errors raised at the document store boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("batch of {size} writes exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("cursor does not reference a document in {0}")]
    InvalidCursor(String),

    #[error("{0}")]
    OperationFailed(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) => ErrorKind::Transient,
            StoreError::NotFound { .. }
            | StoreError::PermissionDenied(_)
            | StoreError::BatchTooLarge { .. }
            | StoreError::InvalidCursor(_) => ErrorKind::Permanent,
            StoreError::OperationFailed(_) => ErrorKind::Infrastructure,
        }
    }
}

/// SyncError はコア API のエラー
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{kind} operation on '{collection}' requires a document id")]
    MissingDocumentId {
        kind: OperationKind,
        collection: String,
    },

    #[error("batch operation has an empty collection name")]
    EmptyCollection,

    #[error("page size must be greater than zero")]
    InvalidPageSize,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Store(err) => err.kind(),
            _ => ErrorKind::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_classified() {
        assert_eq!(
            StoreError::Unavailable("timeout".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            StoreError::PermissionDenied("products".into()).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            StoreError::OperationFailed("boom".into()).kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn store_error_passes_through_sync_error() {
        let err: SyncError = StoreError::Unavailable("network down".into()).into();
        assert_eq!(err.to_string(), "store unavailable: network down");
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn missing_id_names_kind_and_collection() {
        let err = SyncError::MissingDocumentId {
            kind: OperationKind::Delete,
            collection: "products".into(),
        };
        assert_eq!(
            err.to_string(),
            "delete operation on 'products' requires a document id"
        );
    }
}
