use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use stocksync_core::bulk::BulkStatus;
use stocksync_core::domain::{BatchOperation, Product, collections, to_fields};
use stocksync_core::impls::InMemoryDocumentStore;
use stocksync_core::ports::{Clock, DocumentStore, FixedClock};
use stocksync_core::query::{Cursor, ProductFilters};
use stocksync_core::{App, AppBuilder, SyncConfig};

fn product(sku: &str, stock: i64) -> Product {
    Product {
        sku: sku.into(),
        name: format!("สินค้า {sku}"),
        category: "cat-1".into(),
        supplier: "sup-1".into(),
        current_stock: stock,
        min_stock: 5,
        unit_price: 10.0,
        barcode: None,
    }
}

fn app() -> (App, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store: Arc<dyn DocumentStore> =
        Arc::new(InMemoryDocumentStore::with_clock(Arc::clone(&dyn_clock)));
    let app = AppBuilder::new(store)
        .with_clock(dyn_clock)
        .with_config(SyncConfig::default().with_default_page_size(2))
        .build()
        .unwrap();
    (app, clock)
}

async fn seed(app: &App, clock: &FixedClock, stocks: &[i64]) {
    for (i, stock) in stocks.iter().enumerate() {
        let result = app
            .import_records(vec![product(&format!("P{i}"), *stock)], None)
            .await;
        assert_eq!(result.status, BulkStatus::Completed);
        clock.advance(Duration::from_secs(1));
    }
}

#[tokio::test]
async fn five_products_page_in_twos() {
    let (app, clock) = app();
    seed(&app, &clock, &[10, 20, 30, 40, 50]).await;
    assert!(app.cache.is_empty());

    let filters = ProductFilters::new();
    let mut cursor: Option<Cursor> = None;
    let mut shape = Vec::new();
    let mut skus = Vec::new();
    loop {
        let page = app
            .queries
            .get_products_paginated(None, cursor.as_ref(), &filters)
            .await
            .unwrap();
        shape.push((page.len(), page.has_more));
        skus.extend(
            page.items
                .iter()
                .map(|doc| doc.str_field("sku").unwrap().to_string()),
        );
        if !page.has_more {
            assert!(page.next_cursor.is_none());
            break;
        }
        cursor = page.next_cursor;
    }

    assert_eq!(shape, vec![(2, true), (2, true), (1, false)]);
    // newest first
    assert_eq!(skus, vec!["P4", "P3", "P2", "P1", "P0"]);
}

#[tokio::test]
async fn batch_commit_is_visible_to_the_next_query() {
    let (app, clock) = app();
    seed(&app, &clock, &[0, 3, 100]).await;

    let out = app.queries.get_out_of_stock_products(Some(10), None).await.unwrap();
    assert_eq!(out.len(), 1);
    let id = out.items[0].id.clone();

    app.batch
        .add_operation(BatchOperation::update(
            collections::PRODUCTS,
            id,
            to_fields(&json!({ "currentStock": 25 })),
        ))
        .await
        .unwrap();
    app.batch
        .add_operation(BatchOperation::create(
            collections::PRODUCTS,
            to_fields(&product("P9", 0)),
        ))
        .await
        .unwrap();
    let summary = app.commit_batch().await.unwrap();
    assert_eq!((summary.created, summary.updated, summary.deleted), (1, 1, 0));
    assert!(summary.commit_id.is_some());

    let out = app.queries.get_out_of_stock_products(Some(10), None).await.unwrap();
    let skus: Vec<&str> = out.items.iter().filter_map(|d| d.str_field("sku")).collect();
    assert_eq!(skus, vec!["P9"]);

    let summary = app.queries.inventory_summary().await.unwrap();
    assert_eq!(summary.total_products, 4);
    assert_eq!(summary.low_stock, 1);
    assert_eq!(summary.out_of_stock, 1);
}

#[tokio::test]
async fn registry_tracks_every_import_run() {
    let (app, clock) = app();
    seed(&app, &clock, &[1, 2]).await;

    let stats = app.bulk.get_operation_statistics().await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 2);

    assert_eq!(app.bulk.clear_completed_operations().await, 2);
    assert!(app.bulk.get_all_operations().await.is_empty());
}
