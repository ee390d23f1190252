//! InMemoryDocumentStore - 開発・テスト用のドキュメントストア
//!
//! # 実装詳細
//! - コレクションごとに `BTreeMap<DocumentId, Document>` で管理
//! - tokio の Mutex で排他制御（ロックは await をまたがない）
//! - commit は状態のコピーに適用してから差し替えるので all-or-nothing
//! - 障害注入（`fail_next_commit`, `fail_on_id`）で失敗系のテストができる

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Document, DocumentId, Fields, StoreError, WriteOp};
use crate::ports::{Clock, DocumentStore, MAX_BATCH_WRITES, SystemClock};
use crate::query::{Direction, Query};

type Collections = HashMap<String, BTreeMap<DocumentId, Document>>;

struct InMemoryStoreState {
    collections: Collections,

    /// Next document number to assign.
    next_doc: u64,

    /// Number of successful commits.
    commits: usize,

    /// Error returned by the next commit, then cleared.
    fail_next_commit: Option<StoreError>,

    /// Ids whose pointwise update/delete always fails.
    failing_ids: HashSet<DocumentId>,
}

impl InMemoryStoreState {
    fn new() -> Self {
        Self {
            collections: HashMap::new(),
            next_doc: 1,
            commits: 0,
            fail_next_commit: None,
            failing_ids: HashSet::new(),
        }
    }

    fn allocate_id(&mut self) -> DocumentId {
        let id = document_id(self.next_doc);
        self.next_doc += 1;
        id
    }

    fn check_writable(&self, id: &DocumentId) -> Result<(), StoreError> {
        if self.failing_ids.contains(id) {
            return Err(StoreError::PermissionDenied(format!("write to {id} rejected")));
        }
        Ok(())
    }
}

/// Zero-padded to the width of `u64::MAX` so ids sort in allocation order.
fn document_id(n: u64) -> DocumentId {
    DocumentId::new(format!("doc-{n:020}"))
}

/// Apply one write to `collections`.
fn apply_write(
    collections: &mut Collections,
    write: WriteOp,
    id: Option<DocumentId>,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<(), StoreError> {
    match write {
        WriteOp::Create { collection, fields } => {
            let Some(id) = id else {
                return Err(StoreError::OperationFailed("create without allocated id".into()));
            };
            let doc = Document::new(id.clone(), created_at, fields);
            collections.entry(collection).or_default().insert(id, doc);
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.clone(),
                    id: id.to_string(),
                })?;
            doc.fields.extend(fields);
        }
        WriteOp::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.remove(&id);
            }
        }
    }
    Ok(())
}

/// In-memory document store.
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    clock: Arc<dyn Clock>,
    max_batch_size: usize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` for `created_at` stamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::new())),
            clock,
            max_batch_size: MAX_BATCH_WRITES,
        }
    }

    /// Override the per-commit write limit.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Make the next `commit` fail with `error`.
    pub async fn fail_next_commit(&self, error: StoreError) {
        self.state.lock().await.fail_next_commit = Some(error);
    }

    /// Make every pointwise update/delete of `id` fail.
    pub async fn fail_on_id(&self, id: DocumentId) {
        self.state.lock().await.failing_ids.insert(id);
    }

    /// Number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Number of successful commits so far.
    pub async fn commit_count(&self) -> usize {
        self.state.lock().await.commits
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, StoreError> {
        let created_at = self.clock.now();
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let doc = Document::new(id.clone(), created_at, fields);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let created_at = self.clock.now();
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        apply_write(
            &mut state.collections,
            WriteOp::Update {
                collection: collection.to_string(),
                id: id.clone(),
                fields,
            },
            None,
            created_at,
        )
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        if let Some(cursor) = &query.start_after {
            if cursor.collection != query.collection {
                return Err(StoreError::InvalidCursor(query.collection.clone()));
            }
        }

        let state = self.state.lock().await;
        let Some(docs) = state.collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Document> = docs.values().filter(|doc| query.matches(doc)).collect();
        matched.sort_by(|a, b| {
            let ordering = (a.created_at, &a.id).cmp(&(b.created_at, &b.id));
            match query.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .filter(|doc| {
                query
                    .start_after
                    .as_ref()
                    .is_none_or(|cursor| cursor.precedes(doc, query.direction))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        if writes.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: writes.len(),
                limit: self.max_batch_size,
            });
        }

        let created_at = self.clock.now();
        let mut state = self.state.lock().await;
        if let Some(error) = state.fail_next_commit.take() {
            return Err(error);
        }

        // 失敗したら何も反映しない
        let mut staged = state.collections.clone();
        let mut next_doc = state.next_doc;
        for write in writes {
            let id = match &write {
                WriteOp::Create { .. } => {
                    let id = document_id(next_doc);
                    next_doc += 1;
                    Some(id)
                }
                _ => None,
            };
            apply_write(&mut staged, write, id, created_at)?;
        }

        state.collections = staged;
        state.next_doc = next_doc;
        state.commits += 1;
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::to_fields;
    use crate::ports::FixedClock;
    use crate::query::{Cursor, Filter};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn fields(value: serde_json::Value) -> Fields {
        to_fields(&value)
    }

    fn store_with_clock() -> (InMemoryDocumentStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (InMemoryDocumentStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn insert_get_update_delete() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .insert("products", fields(json!({ "sku": "A", "currentStock": 1 })))
            .await
            .unwrap();

        store
            .update("products", &id, fields(json!({ "currentStock": 9 })))
            .await
            .unwrap();
        let doc = store.get("products", &id).await.unwrap().unwrap();
        assert_eq!(doc.str_field("sku"), Some("A"));
        assert_eq!(doc.number_field("currentStock"), Some(9.0));

        store.delete("products", &id).await.unwrap();
        assert!(store.get("products", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_keep_insertion_order_past_a_million_documents() {
        let (store, _clock) = store_with_clock();
        store.state.lock().await.next_doc = 999_999;
        let older = store.insert("products", Fields::new()).await.unwrap();
        let newer = store.insert("products", Fields::new()).await.unwrap();
        assert!(older < newer);

        // same created_at: ties fall back to the id
        let docs = store.query(&Query::collection("products")).await.unwrap();
        let ids: Vec<DocumentId> = docs.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update("products", &DocumentId::new("nope"), Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_resumes_after_cursor() {
        let (store, clock) = store_with_clock();
        for n in 0..4 {
            store.insert("products", fields(json!({ "n": n }))).await.unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let first = store
            .query(&Query::collection("products").limit(2))
            .await
            .unwrap();
        let ns: Vec<_> = first.iter().map(|d| d.number_field("n").unwrap()).collect();
        assert_eq!(ns, vec![3.0, 2.0]);

        let cursor = Cursor::after("products", first.last().unwrap());
        let rest = store
            .query(&Query::collection("products").start_after(Some(cursor)))
            .await
            .unwrap();
        let ns: Vec<_> = rest.iter().map(|d| d.number_field("n").unwrap()).collect();
        assert_eq!(ns, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn query_applies_filters() {
        let store = InMemoryDocumentStore::new();
        for stock in [0, 3, 20] {
            store
                .insert("products", fields(json!({ "currentStock": stock })))
                .await
                .unwrap();
        }
        let low = store
            .query(
                &Query::collection("products")
                    .filter(Filter::gt("currentStock", 0))
                    .filter(Filter::lte("currentStock", 10)),
            )
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].number_field("currentStock"), Some(3.0));
    }

    #[tokio::test]
    async fn cursor_from_another_collection_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert("categories", Fields::new()).await.unwrap();
        let doc = store.get("categories", &id).await.unwrap().unwrap();
        let err = store
            .query(&Query::collection("products").start_after(Some(Cursor::after("categories", &doc))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new();
        let writes = vec![
            WriteOp::Create {
                collection: "products".into(),
                fields: Fields::new(),
            },
            WriteOp::Update {
                collection: "products".into(),
                id: DocumentId::new("missing"),
                fields: Fields::new(),
            },
        ];
        assert!(store.commit(writes).await.is_err());
        assert_eq!(store.len("products").await, 0);
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn commit_rejects_oversized_batches() {
        let store = InMemoryDocumentStore::new().with_max_batch_size(2);
        let writes = (0..3)
            .map(|_| WriteOp::Create {
                collection: "products".into(),
                fields: Fields::new(),
            })
            .collect();
        let err = store.commit(writes).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size: 3, limit: 2 }));
    }

    #[tokio::test]
    async fn injected_commit_failure_fires_once() {
        let store = InMemoryDocumentStore::new();
        store
            .fail_next_commit(StoreError::Unavailable("offline".into()))
            .await;
        assert!(store.commit(Vec::new()).await.is_err());
        assert!(store.commit(Vec::new()).await.is_ok());
    }
}
