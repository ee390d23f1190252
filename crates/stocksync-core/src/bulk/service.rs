//! BulkOperationService - 多数のアイテムに非同期アクションを順番に適用する
//!
//! # 実行の流れ
//! 1. run record を登録（Pending, progress 0）
//! 2. Processing に遷移
//! 3. アイテムを入力順に 1 件ずつ処理（並列化しない）
//!    - 失敗はアイテム単位で記録し、run は止めない
//! 4. 1 件ごとに progress を再計算し、コールバックを呼ぶ
//! 5. 失敗が 0 件なら Completed、1 件でもあれば Failed
//!
//! レジストリのロックはアイテムの await をまたいで保持しないので、
//! 実行中でも `get_operation` で進捗を確認できます。

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{BulkKind, BulkOperation, BulkStatus};
use crate::domain::{Document, DocumentId, Fields, Record, RunId, StoreError};
use crate::ports::{Clock, DocumentStore, IdGenerator};
use crate::query::Query;

/// Message recorded when an action fails with an empty error message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Progress callback: `(processed, total)`.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(usize, usize) + Send);

/// An item whose action failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem<T> {
    pub item: T,
    pub error: String,
}

/// Outcome of one bulk run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult<T> {
    pub run_id: RunId,
    pub status: BulkStatus,
    pub success: Vec<T>,
    pub failed: Vec<FailedItem<T>>,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

impl<T> BulkOperationResult<T> {
    fn new(run_id: RunId, total: usize) -> Self {
        Self {
            run_id,
            status: BulkStatus::Processing,
            success: Vec::with_capacity(total),
            failed: Vec::new(),
            total,
            success_count: 0,
            failure_count: 0,
        }
    }

    /// Some items succeeded and some failed (status is `Failed`).
    pub fn is_partial(&self) -> bool {
        self.success_count > 0 && self.failure_count > 0
    }
}

/// Run counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkStatistics {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Run records keyed by id, remembering registration order.
#[derive(Default)]
struct RunRegistry {
    next_seq: u64,
    runs: HashMap<RunId, (u64, BulkOperation)>,
}

impl RunRegistry {
    fn insert(&mut self, run: BulkOperation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.runs.insert(run.id, (seq, run));
    }

    fn get(&self, run_id: &RunId) -> Option<&BulkOperation> {
        self.runs.get(run_id).map(|(_, run)| run)
    }

    fn get_mut(&mut self, run_id: &RunId) -> Option<&mut BulkOperation> {
        self.runs.get_mut(run_id).map(|(_, run)| run)
    }

    fn values(&self) -> impl Iterator<Item = &BulkOperation> {
        self.runs.values().map(|(_, run)| run)
    }

    /// Matching runs in registration order.
    fn collect(&self, keep: impl Fn(&BulkOperation) -> bool) -> Vec<BulkOperation> {
        let mut runs: Vec<&(u64, BulkOperation)> =
            self.runs.values().filter(|(_, run)| keep(run)).collect();
        runs.sort_by_key(|(seq, _)| *seq);
        runs.into_iter().map(|(_, run)| run.clone()).collect()
    }

    fn len(&self) -> usize {
        self.runs.len()
    }

    fn retain(&mut self, keep: impl Fn(&BulkOperation) -> bool) {
        self.runs.retain(|_, (_, run)| keep(run));
    }

    fn clear(&mut self) {
        self.runs.clear();
    }
}

/// Bulk operation runner with an in-memory registry of runs.
pub struct BulkOperationService {
    registry: Arc<Mutex<RunRegistry>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl BulkOperationService {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(RunRegistry::default())),
            clock,
            ids,
        }
    }

    /// Apply `action` to every item, one at a time, in input order.
    ///
    /// `action` receives a borrow of the item; the future it returns must not
    /// borrow from it, so copy out whatever the write needs first. A failing
    /// item is recorded and the run moves on; no aggregate error is raised.
    pub async fn execute<T, F, Fut, E>(
        &self,
        kind: BulkKind,
        items: Vec<T>,
        mut action: F,
        mut on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let run_id = self.ids.generate_run_id();
        let total = items.len();
        let snapshot = items
            .iter()
            .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
            .collect();

        {
            let mut registry = self.registry.lock().await;
            registry.insert(BulkOperation::new(run_id, kind, snapshot, self.clock.now()));
        }
        tracing::info!(%run_id, %kind, total, "bulk run started");

        self.update(run_id, BulkOperation::start).await;

        let mut result = BulkOperationResult::new(run_id, total);
        for (index, item) in items.into_iter().enumerate() {
            let error = match action(&item).await {
                Ok(()) => {
                    result.success.push(item);
                    None
                }
                Err(err) => {
                    let message = error_message(&err);
                    tracing::warn!(%run_id, item = index, error = %message, "bulk item failed");
                    result.failed.push(FailedItem {
                        item,
                        error: message.clone(),
                    });
                    Some(message)
                }
            };

            self.update(run_id, |run| run.record_item(error)).await;
            if let Some(callback) = on_progress.as_mut() {
                callback(index + 1, total);
            }
        }

        result.success_count = result.success.len();
        result.failure_count = result.failed.len();
        result.status = if result.failure_count == 0 {
            BulkStatus::Completed
        } else {
            BulkStatus::Failed
        };

        let finished_at = self.clock.now();
        self.update(run_id, |run| run.finish(finished_at)).await;
        tracing::info!(
            %run_id,
            %kind,
            status = %result.status,
            succeeded = result.success_count,
            failed = result.failure_count,
            "bulk run finished"
        );
        result
    }

    async fn update<R>(&self, run_id: RunId, f: impl FnOnce(&mut BulkOperation) -> R) -> Option<R> {
        let mut registry = self.registry.lock().await;
        registry.get_mut(&run_id).map(f)
    }

    pub async fn bulk_create<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        action: F,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute(BulkKind::Create, items, action, on_progress).await
    }

    pub async fn bulk_update<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        action: F,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute(BulkKind::Update, items, action, on_progress).await
    }

    pub async fn bulk_delete<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        action: F,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute(BulkKind::Delete, items, action, on_progress).await
    }

    pub async fn bulk_import<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        action: F,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute(BulkKind::Import, items, action, on_progress).await
    }

    pub async fn bulk_export<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        action: F,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<T>
    where
        T: Serialize,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute(BulkKind::Export, items, action, on_progress).await
    }

    // ----------------------------------------
    // Store-backed runs
    // ----------------------------------------

    /// Insert every field map into `collection`, one document at a time.
    pub async fn create_documents(
        &self,
        store: &Arc<dyn DocumentStore>,
        collection: &str,
        items: Vec<Fields>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<Fields> {
        let action = |fields: &Fields| {
            let store = Arc::clone(store);
            let collection = collection.to_string();
            let fields = fields.clone();
            async move { store.insert(&collection, fields).await.map(|_| ()) }
        };
        self.bulk_create(items, action, on_progress).await
    }

    /// Merge each field map into its document.
    pub async fn update_documents(
        &self,
        store: &Arc<dyn DocumentStore>,
        collection: &str,
        items: Vec<(DocumentId, Fields)>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<(DocumentId, Fields)> {
        let action = |(id, fields): &(DocumentId, Fields)| {
            let store = Arc::clone(store);
            let collection = collection.to_string();
            let id = id.clone();
            let fields = fields.clone();
            async move { store.update(&collection, &id, fields).await }
        };
        self.bulk_update(items, action, on_progress).await
    }

    pub async fn delete_documents(
        &self,
        store: &Arc<dyn DocumentStore>,
        collection: &str,
        ids: Vec<DocumentId>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<DocumentId> {
        let action = |id: &DocumentId| {
            let store = Arc::clone(store);
            let collection = collection.to_string();
            let id = id.clone();
            async move { store.delete(&collection, &id).await }
        };
        self.bulk_delete(ids, action, on_progress).await
    }

    /// Insert typed records into their collection.
    pub async fn import_records<R>(
        &self,
        store: &Arc<dyn DocumentStore>,
        records: Vec<R>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> BulkOperationResult<R>
    where
        R: Record,
    {
        let action = |record: &R| {
            let store = Arc::clone(store);
            let fields = record.to_fields();
            async move { store.insert(R::COLLECTION, fields).await.map(|_| ()) }
        };
        self.bulk_import(records, action, on_progress).await
    }

    /// Read the whole collection of `R` and decode every document.
    ///
    /// Documents that do not decode are reported as failed items.
    pub async fn export_records<R>(
        &self,
        store: &Arc<dyn DocumentStore>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<(Vec<R>, BulkOperationResult<Document>), StoreError>
    where
        R: Record,
    {
        let documents = store.query(&Query::collection(R::COLLECTION)).await?;
        let mut decoded = Vec::with_capacity(documents.len());
        let action = |doc: &Document| {
            let outcome = match R::from_document(doc) {
                Some(record) => {
                    decoded.push(record);
                    Ok(())
                }
                None => Err(format!(
                    "document {} does not match the {} record shape",
                    doc.id,
                    R::COLLECTION
                )),
            };
            std::future::ready(outcome)
        };
        let result = self.bulk_export(documents, action, on_progress).await;
        Ok((decoded, result))
    }

    // ----------------------------------------
    // Registry
    // ----------------------------------------

    pub async fn get_operation(&self, run_id: RunId) -> Option<BulkOperation> {
        self.registry.lock().await.get(&run_id).cloned()
    }

    /// All runs, in the order they were started.
    pub async fn get_all_operations(&self) -> Vec<BulkOperation> {
        self.registry.lock().await.collect(|_| true)
    }

    /// Runs in `status`, in the order they were started.
    pub async fn get_operations_by_status(&self, status: BulkStatus) -> Vec<BulkOperation> {
        self.registry
            .lock()
            .await
            .collect(|run| run.status == status)
    }

    /// Drop Completed and Failed runs; returns how many were removed.
    pub async fn clear_completed_operations(&self) -> usize {
        let mut registry = self.registry.lock().await;
        let before = registry.len();
        registry.retain(|run| !run.status.is_terminal());
        before - registry.len()
    }

    pub async fn clear_all_operations(&self) {
        self.registry.lock().await.clear();
    }

    pub async fn get_operation_statistics(&self) -> BulkStatistics {
        let registry = self.registry.lock().await;
        let mut stats = BulkStatistics {
            total: registry.len(),
            ..BulkStatistics::default()
        };
        for run in registry.values() {
            match run.status {
                BulkStatus::Pending => stats.pending += 1,
                BulkStatus::Processing => stats.processing += 1,
                BulkStatus::Completed => stats.completed += 1,
                BulkStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

fn error_message(err: &impl Display) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}
