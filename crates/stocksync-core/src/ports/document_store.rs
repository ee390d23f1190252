//! DocumentStore port - ホスティングされたドキュメント DB の抽象化
//!
//! コアが外部ストアに要求するのは次の操作だけです：
//! - コレクション単位の insert
//! - ID 指定の get / update / delete
//! - 等価・範囲フィルタ + 並び順 1 つ + limit + start-after cursor のクエリ
//! - 最大 500 件までのアトミックな一括コミット
//!
//! # 実装
//! - **InMemoryDocumentStore**: 開発・テスト用（`impls::inmem_store`）

use async_trait::async_trait;

use crate::domain::{Document, DocumentId, Fields, StoreError, WriteOp};
use crate::query::Query;

/// Hard ceiling on writes per atomic commit imposed by the backing store.
pub const MAX_BATCH_WRITES: usize = 500;

/// DocumentStore は外部ストアへのインターフェース
///
/// # 設計原則
/// - `commit` は all-or-nothing（一部だけ適用されることはない）
/// - `query` の結果は `Query::direction` に従って作成日時順
/// - リトライやバックオフは行わない（エラーはそのまま返す）
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its generated id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, StoreError>;

    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    /// Merge `fields` into an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply all writes atomically, in order.
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Maximum number of writes accepted by one `commit`.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_WRITES
    }
}
