//! Query - ページング付き読み取り
//!
//! - `Query` / `Filter` / `Cursor` / `Page`: DocumentStore に渡す読み取り要求の型
//! - `OptimizedQueries`: 在庫画面向けのクエリ（キャッシュ付き）
//!
//! 並び順は常に作成日時の降順です。Cursor は前ページ最後のドキュメントを指す
//! 位置情報なので、並び順を変えると発行済みの Cursor はすべて無効になります。

mod optimized;

pub use optimized::{InventorySummary, OptimizedQueries, ProductFilters};

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Document, DocumentId, Fields};

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn symbol(self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

/// One equality or range predicate on a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }

    /// Evaluate against a field map. A missing field never matches.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };
        let Some(ordering) = compare_values(actual, &self.value) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.op.symbol(), self.value)
    }
}

/// Numbers compare numerically (so `0` equals `0.0`), strings lexically,
/// everything else only by equality.
fn compare_values(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

/// Positional marker: the last document of the previous page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub collection: String,
    pub document_id: DocumentId,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    pub fn after(collection: impl Into<String>, doc: &Document) -> Self {
        Self {
            collection: collection.into(),
            document_id: doc.id.clone(),
            created_at: doc.created_at,
        }
    }

    /// Whether `doc` sorts strictly after this cursor in `direction`.
    ///
    /// Ties on `created_at` are broken by document id in the same direction.
    pub fn precedes(&self, doc: &Document, direction: Direction) -> bool {
        let ordering = (doc.created_at, &doc.id).cmp(&(self.created_at, &self.document_id));
        match direction {
            Direction::Ascending => ordering == Ordering::Greater,
            Direction::Descending => ordering == Ordering::Less,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.document_id,
            self.created_at.timestamp_micros()
        )
    }
}

/// A read request: filters, creation-time ordering, limit, start-after cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub direction: Direction,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            direction: Direction::Descending,
            limit: None,
            start_after: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(&doc.fields))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Set only when `has_more`.
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::to_fields;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn stock(n: serde_json::Value) -> Fields {
        to_fields(&json!({ "currentStock": n, "category": "drinks" }))
    }

    #[rstest]
    #[case(Filter::eq("currentStock", 0), json!(0.0), true)]
    #[case(Filter::eq("currentStock", 0), json!(1), false)]
    #[case(Filter::gt("currentStock", 0), json!(1), true)]
    #[case(Filter::gt("currentStock", 0), json!(0), false)]
    #[case(Filter::lte("currentStock", 10), json!(10), true)]
    #[case(Filter::lte("currentStock", 10), json!(11), false)]
    #[case(Filter::gte("currentStock", 5), json!(5), true)]
    #[case(Filter::lt("currentStock", 5), json!(5), false)]
    fn numeric_filters(#[case] filter: Filter, #[case] value: serde_json::Value, #[case] expected: bool) {
        assert_eq!(filter.matches(&stock(value)), expected);
    }

    #[test]
    fn equality_on_strings_and_missing_fields() {
        let fields = stock(json!(3));
        assert!(Filter::eq("category", "drinks").matches(&fields));
        assert!(!Filter::eq("category", "snacks").matches(&fields));
        assert!(!Filter::eq("supplier", "s1").matches(&fields));
        // type mismatch never matches
        assert!(!Filter::gt("category", 1).matches(&fields));
    }

    #[test]
    fn cursor_orders_by_creation_then_id() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let doc = |id: &str, secs: i64| {
            Document::new(DocumentId::new(id), t + chrono::Duration::seconds(secs), Fields::new())
        };
        let cursor = Cursor::after("products", &doc("b", 10));

        assert!(cursor.precedes(&doc("x", 5), Direction::Descending));
        assert!(cursor.precedes(&doc("a", 10), Direction::Descending));
        assert!(!cursor.precedes(&doc("b", 10), Direction::Descending));
        assert!(!cursor.precedes(&doc("c", 10), Direction::Descending));
        assert!(cursor.precedes(&doc("c", 10), Direction::Ascending));
    }
}
