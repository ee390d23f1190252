//! BatchOperations - 書き込みをまとめてアトミックにコミットする accumulator
//!
//! # 流れ
//! 1. `add_operation` で検証してからバッファに積む
//! 2. バッファが上限（既定 500 件、ストアの上限を超えない）に達したら即コミット
//! 3. `commit` は create → update → delete の順に 1 回のストアコミットで適用
//!
//! コミットが失敗した場合、バッファはそのまま残り、エラーは呼び出し元に返ります。
//! `add_operation` が Err を返したとき、その操作はバッファに入っていません。
//! バッファは async Mutex の内側にあり、コミット中もロックを保持するので
//! 複数の呼び出し元が同時に使っても直列化されます。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::{BatchOperation, CommitId, OperationKind, SyncError, WriteOp};
use crate::ports::{DocumentStore, IdGenerator};

/// What one commit applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// `None` when nothing was pending and the store was not called.
    pub commit_id: Option<CommitId>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// `add_operations` stopped partway through.
///
/// Operations before the failing one are buffered or already committed; the
/// failing one and everything after it are not.
#[derive(Debug, thiserror::Error)]
#[error("{source} ({accepted} operations accepted, {} auto-commits applied)", .commits.len())]
pub struct AddOperationsError {
    /// Operations taken into the batch before the failure.
    pub accepted: usize,
    /// Auto-commits that succeeded before the failure.
    pub commits: Vec<CommitSummary>,
    #[source]
    pub source: SyncError,
}

/// Write batch accumulator.
pub struct BatchOperations {
    store: Arc<dyn DocumentStore>,
    ids: Arc<dyn IdGenerator>,
    limit: usize,
    pending: Mutex<Vec<BatchOperation>>,
}

impl BatchOperations {
    /// `limit` is clamped to `1..=store.max_batch_size()`.
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<dyn IdGenerator>, limit: usize) -> Self {
        let limit = limit.clamp(1, store.max_batch_size().max(1));
        Self {
            store,
            ids,
            limit,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Buffer one operation.
    ///
    /// Returns the summary of the automatic commit when this call triggered one.
    /// On `Err` the operation is not buffered, so retrying it cannot duplicate
    /// the write.
    pub async fn add_operation(
        &self,
        op: BatchOperation,
    ) -> Result<Option<CommitSummary>, SyncError> {
        op.validate()?;
        let mut pending = self.pending.lock().await;
        self.push_locked(&mut pending, op).await
    }

    /// Buffer many operations.
    ///
    /// The whole set is validated before anything is buffered. If an
    /// automatic commit fails midway, the error reports how many operations
    /// were accepted and which commits were applied; the rest are not added.
    pub async fn add_operations(
        &self,
        ops: impl IntoIterator<Item = BatchOperation>,
    ) -> Result<Vec<CommitSummary>, AddOperationsError> {
        let ops: Vec<BatchOperation> = ops.into_iter().collect();
        for op in &ops {
            op.validate().map_err(|source| AddOperationsError {
                accepted: 0,
                commits: Vec::new(),
                source,
            })?;
        }

        let mut pending = self.pending.lock().await;
        let mut commits = Vec::new();
        for (accepted, op) in ops.into_iter().enumerate() {
            match self.push_locked(&mut pending, op).await {
                Ok(Some(summary)) => commits.push(summary),
                Ok(None) => {}
                Err(source) => {
                    return Err(AddOperationsError {
                        accepted,
                        commits,
                        source,
                    });
                }
            }
        }
        Ok(commits)
    }

    /// Push `op`; commit when the buffer reaches the limit.
    ///
    /// A failed commit takes `op` back out, so the buffer stays below the
    /// limit and the caller's error means "not buffered".
    async fn push_locked(
        &self,
        pending: &mut Vec<BatchOperation>,
        op: BatchOperation,
    ) -> Result<Option<CommitSummary>, SyncError> {
        pending.push(op);
        if pending.len() < self.limit {
            return Ok(None);
        }
        match self.commit_locked(pending).await {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                pending.pop();
                Err(err)
            }
        }
    }

    /// Commit everything pending as one atomic unit.
    pub async fn commit(&self) -> Result<CommitSummary, SyncError> {
        let mut pending = self.pending.lock().await;
        self.commit_locked(&mut pending).await
    }

    async fn commit_locked(
        &self,
        pending: &mut Vec<BatchOperation>,
    ) -> Result<CommitSummary, SyncError> {
        if pending.is_empty() {
            return Ok(CommitSummary::default());
        }

        let commit_id = self.ids.generate_commit_id();
        let mut summary = CommitSummary {
            commit_id: Some(commit_id),
            ..CommitSummary::default()
        };

        let mut writes: Vec<WriteOp> = Vec::with_capacity(pending.len());
        for kind in [
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Delete,
        ] {
            for op in pending.iter().filter(|op| op.kind == kind) {
                writes.push(op.clone().into_write()?);
            }
        }
        for write in &writes {
            match write.kind() {
                OperationKind::Create => summary.created += 1,
                OperationKind::Update => summary.updated += 1,
                OperationKind::Delete => summary.deleted += 1,
            }
        }

        if let Err(err) = self.store.commit(writes).await {
            tracing::error!(
                %commit_id,
                pending = pending.len(),
                error = %err,
                "batch commit failed; operations kept"
            );
            return Err(err.into());
        }

        pending.clear();
        tracing::info!(
            %commit_id,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "batch committed"
        );
        Ok(summary)
    }

    pub async fn operation_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drop everything pending without committing.
    pub async fn clear(&self) {
        self.pending.lock().await.clear();
    }
}
