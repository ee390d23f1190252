//! OptimizedQueries - 在庫画面向けのページング + キャッシュ付きクエリ

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{Cursor, Filter, Page, Query};
use crate::cache::DataCache;
use crate::config::SyncConfig;
use crate::domain::inventory::fields;
use crate::domain::{Document, SyncError, collections};
use crate::ports::DocumentStore;

/// Optional product filters; unset fields are not constrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
}

impl ProductFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    /// Inclusive stock range.
    pub fn stock_between(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_stock = min;
        self.max_stock = max;
        self
    }

    pub fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(category) = &self.category {
            filters.push(Filter::eq(fields::CATEGORY, category.as_str()));
        }
        if let Some(supplier) = &self.supplier {
            filters.push(Filter::eq(fields::SUPPLIER, supplier.as_str()));
        }
        if let Some(min) = self.min_stock {
            filters.push(Filter::gte(fields::CURRENT_STOCK, min));
        }
        if let Some(max) = self.max_stock {
            filters.push(Filter::lte(fields::CURRENT_STOCK, max));
        }
        filters
    }
}

/// Stock overview for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_products: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    pub total_stock_value: f64,
}

/// Paginated, cached reads against the document store.
pub struct OptimizedQueries {
    store: Arc<dyn DocumentStore>,
    cache: Arc<DataCache>,
    cache_ttl: Duration,
    default_page_size: usize,
    low_stock_threshold: i64,
}

impl OptimizedQueries {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<DataCache>, config: &SyncConfig) -> Self {
        Self {
            store,
            cache,
            cache_ttl: config.cache_ttl,
            default_page_size: config.default_page_size,
            low_stock_threshold: config.low_stock_threshold,
        }
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// One page of `collection`, newest first.
    ///
    /// `page_size` falls back to the configured default. Reads one document
    /// more than the page holds; the extra one only tells whether another
    /// page exists and is not returned.
    pub async fn get_page(
        &self,
        collection: &str,
        page_size: Option<usize>,
        cursor: Option<&Cursor>,
        filters: &[Filter],
    ) -> Result<Page<Document>, SyncError> {
        let page_size = page_size.unwrap_or(self.default_page_size);
        if page_size == 0 {
            return Err(SyncError::InvalidPageSize);
        }

        let key = page_key(collection, page_size, cursor, filters);
        if let Some(page) = self.cache.get::<Page<Document>>(&key) {
            tracing::debug!(%key, "page cache hit");
            return Ok(page);
        }

        let query = Query::collection(collection)
            .filters(filters.iter().cloned())
            .limit(page_size.saturating_add(1))
            .start_after(cursor.cloned());
        let mut items = self.store.query(&query).await?;

        let has_more = items.len() > page_size;
        items.truncate(page_size);
        let next_cursor = if has_more {
            items.last().map(|doc| Cursor::after(collection, doc))
        } else {
            None
        };
        let page = Page {
            items,
            next_cursor,
            has_more,
        };

        tracing::debug!(%key, items = page.len(), has_more, "page cache miss");
        self.cache.set(key, page.clone(), self.cache_ttl);
        Ok(page)
    }

    pub async fn get_products_paginated(
        &self,
        page_size: Option<usize>,
        cursor: Option<&Cursor>,
        filters: &ProductFilters,
    ) -> Result<Page<Document>, SyncError> {
        self.get_page(collections::PRODUCTS, page_size, cursor, &filters.to_filters())
            .await
    }

    /// Products with `0 < stock <= threshold` (configured threshold when `None`).
    pub async fn get_low_stock_products(
        &self,
        threshold: Option<i64>,
        page_size: Option<usize>,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Document>, SyncError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let filters = [
            Filter::gt(fields::CURRENT_STOCK, 0),
            Filter::lte(fields::CURRENT_STOCK, threshold),
        ];
        self.get_page(collections::PRODUCTS, page_size, cursor, &filters)
            .await
    }

    /// Products with `stock == 0`.
    pub async fn get_out_of_stock_products(
        &self,
        page_size: Option<usize>,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Document>, SyncError> {
        let filters = [Filter::eq(fields::CURRENT_STOCK, 0)];
        self.get_page(collections::PRODUCTS, page_size, cursor, &filters)
            .await
    }

    /// Whole collection, cached. Meant for small reference collections.
    pub async fn get_collection_cached(&self, collection: &str) -> Result<Vec<Document>, SyncError> {
        let key = format!("{collection}:all");
        if let Some(docs) = self.cache.get::<Vec<Document>>(&key) {
            return Ok(docs);
        }
        let docs = self.store.query(&Query::collection(collection)).await?;
        self.cache.set(key, docs.clone(), self.cache_ttl);
        Ok(docs)
    }

    pub async fn get_categories_cached(&self) -> Result<Vec<Document>, SyncError> {
        self.get_collection_cached(collections::CATEGORIES).await
    }

    pub async fn get_suppliers_cached(&self) -> Result<Vec<Document>, SyncError> {
        self.get_collection_cached(collections::SUPPLIERS).await
    }

    /// Product counts and total stock value, cached.
    pub async fn inventory_summary(&self) -> Result<InventorySummary, SyncError> {
        let key = format!("{}:summary:{}", collections::PRODUCTS, self.low_stock_threshold);
        if let Some(summary) = self.cache.get::<InventorySummary>(&key) {
            return Ok(summary);
        }

        let products = self
            .store
            .query(&Query::collection(collections::PRODUCTS))
            .await?;
        let mut summary = InventorySummary {
            total_products: products.len(),
            ..InventorySummary::default()
        };
        let threshold = self.low_stock_threshold as f64;
        for doc in &products {
            let stock = doc.number_field(fields::CURRENT_STOCK).unwrap_or(0.0);
            let price = doc.number_field(fields::UNIT_PRICE).unwrap_or(0.0);
            if stock == 0.0 {
                summary.out_of_stock += 1;
            } else if stock > 0.0 && stock <= threshold {
                summary.low_stock += 1;
            }
            summary.total_stock_value += stock * price;
        }

        self.cache.set(key, summary.clone(), self.cache_ttl);
        Ok(summary)
    }

    /// Drop every cached read of `collection`; returns how many entries.
    pub fn invalidate(&self, collection: &str) -> usize {
        self.cache.invalidate_prefix(&format!("{collection}:"))
    }
}

fn page_key(collection: &str, page_size: usize, cursor: Option<&Cursor>, filters: &[Filter]) -> String {
    let cursor = cursor.map_or_else(|| "start".to_string(), Cursor::to_string);
    let filters: Vec<String> = filters.iter().map(Filter::to_string).collect();
    format!("{collection}:page:{page_size}:{cursor}:{}", filters.join(","))
}
