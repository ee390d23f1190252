//! AppBuilder - サービスの構築とワイヤリング
//!
//! - DocumentStore / Clock / IdGenerator / SyncConfig を受け取り、
//!   DataCache・OptimizedQueries・BatchOperations・BulkOperationService を組み立てる
//! - 起動時検証（Fail-fast 設計）: 設定がストアの制約に合わなければ BuildError
//!
//! グローバルな状態は持たないので、テストごとに独立した App を作れます。

use std::sync::Arc;

use crate::batch::{BatchOperations, CommitSummary};
use crate::bulk::{BulkOperationResult, BulkOperationService, ProgressFn};
use crate::cache::DataCache;
use crate::config::SyncConfig;
use crate::domain::{BatchOperation, DocumentId, Fields, Record, SyncError};
use crate::ports::{Clock, DocumentStore, IdGenerator, SystemClock, UlidGenerator};
use crate::query::OptimizedQueries;

/// AppBuilder はサービス一式を構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(store)
///     .with_config(SyncConfig::default().with_batch_limit(100))
///     .build()?;
/// let page = app.queries.get_products_paginated(None, None, &ProductFilters::new()).await?;
/// ```
pub struct AppBuilder {
    store: Arc<dyn DocumentStore>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: SyncConfig,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
}

impl AppBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: None,
            ids: None,
            config: SyncConfig::default(),
        }
    }

    /// 既定は SystemClock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 既定は Clock を使う UlidGenerator
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// 設定を検証して App を生成
    pub fn build(self) -> Result<App, BuildError> {
        self.config
            .validate(self.store.max_batch_size())
            .map_err(BuildError::InvalidConfig)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let cache = Arc::new(DataCache::with_default_ttl(
            Arc::clone(&clock),
            self.config.cache_ttl,
        ));
        let queries = OptimizedQueries::new(Arc::clone(&self.store), Arc::clone(&cache), &self.config);
        let batch = BatchOperations::new(
            Arc::clone(&self.store),
            Arc::clone(&ids),
            self.config.batch_limit,
        );
        let bulk = BulkOperationService::new(clock, ids);

        tracing::debug!(
            batch_limit = self.config.batch_limit,
            cache_ttl_secs = self.config.cache_ttl.as_secs(),
            "sync services built"
        );
        Ok(App {
            config: self.config,
            store: self.store,
            cache,
            queries,
            batch,
            bulk,
        })
    }
}

/// App は構築済みのサービス一式
///
/// 書き込みは App のメソッド経由で行うとキャッシュが破棄されます。
/// `batch` / `bulk` / `store` を直接使った書き込みでは、キャッシュは TTL まで残ります。
pub struct App {
    pub config: SyncConfig,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<DataCache>,
    pub queries: OptimizedQueries,
    pub batch: BatchOperations,
    pub bulk: BulkOperationService,
}

impl App {
    /// Buffer a write; cached reads are dropped when the buffer auto-commits.
    pub async fn add_batch_operation(
        &self,
        op: BatchOperation,
    ) -> Result<Option<CommitSummary>, SyncError> {
        let committed = self.batch.add_operation(op).await?;
        if committed.is_some_and(|summary| !summary.is_empty()) {
            self.cache.clear();
        }
        Ok(committed)
    }

    /// Commit pending batch writes; cached reads are dropped when anything was written.
    pub async fn commit_batch(&self) -> Result<CommitSummary, SyncError> {
        let summary = self.batch.commit().await?;
        if !summary.is_empty() {
            self.cache.clear();
        }
        Ok(summary)
    }

    // ----------------------------------------
    // Store-backed bulk runs
    // ----------------------------------------

    pub async fn import_records<R: Record>(
        &self,
        records: Vec<R>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<R> {
        let result = self
            .bulk
            .import_records(&self.store, records, on_progress)
            .await;
        self.drop_cache_after(result)
    }

    pub async fn create_documents(
        &self,
        collection: &str,
        items: Vec<Fields>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<Fields> {
        let result = self
            .bulk
            .create_documents(&self.store, collection, items, on_progress)
            .await;
        self.drop_cache_after(result)
    }

    pub async fn update_documents(
        &self,
        collection: &str,
        items: Vec<(DocumentId, Fields)>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<(DocumentId, Fields)> {
        let result = self
            .bulk
            .update_documents(&self.store, collection, items, on_progress)
            .await;
        self.drop_cache_after(result)
    }

    pub async fn delete_documents(
        &self,
        collection: &str,
        ids: Vec<DocumentId>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<DocumentId> {
        let result = self
            .bulk
            .delete_documents(&self.store, collection, ids, on_progress)
            .await;
        self.drop_cache_after(result)
    }

    /// Any successful item wrote to the store.
    fn drop_cache_after<T>(&self, result: BulkOperationResult<T>) -> BulkOperationResult<T> {
        if result.success_count > 0 {
            self.cache.clear();
        }
        result
    }
}
