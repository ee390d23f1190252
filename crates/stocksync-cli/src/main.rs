//! stocksync デモ
//!
//! インメモリのストアに在庫データを投入し、ページング・低在庫検索・
//! バッチ更新・バルク実行の統計までを一通り流します。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stocksync_core::bulk::BulkStatistics;
use stocksync_core::domain::inventory::fields;
use stocksync_core::domain::{
    BatchOperation, Category, Document, Fields, Product, Supplier, collections,
};
use stocksync_core::impls::InMemoryDocumentStore;
use stocksync_core::ports::DocumentStore;
use stocksync_core::query::{Cursor, InventorySummary, ProductFilters};
use stocksync_core::{App, AppBuilder, SyncConfig};

#[derive(Debug, Parser)]
#[command(name = "stocksync", about = "Bulk/batch sync demo against an in-memory store")]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON formatted logs
    #[arg(long)]
    json_logs: bool,

    /// Number of products to seed
    #[arg(long, default_value_t = 25)]
    products: usize,

    /// Page size for product listings
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Stock added to every low-stock product by the restock batch
    #[arg(long, default_value_t = 50)]
    restock: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoReport {
    pages: usize,
    before: InventorySummary,
    after: InventorySummary,
    restocked: usize,
    bulk_runs: BulkStatistics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let app = AppBuilder::new(Arc::clone(&store))
        .with_config(SyncConfig::default().with_default_page_size(args.page_size))
        .build()
        .context("failed to build sync services")?;

    seed(&app, args.products).await?;

    let pages = walk_products(&app).await?;
    let before = app.queries.inventory_summary().await?;
    tracing::info!(
        total = before.total_products,
        low = before.low_stock,
        out = before.out_of_stock,
        value = before.total_stock_value,
        "inventory before restock"
    );

    let restocked = restock_low_stock(&app, args.restock).await?;
    let after = app.queries.inventory_summary().await?;

    let report = DemoReport {
        pages,
        before,
        after,
        restocked,
        bulk_runs: app.bulk.get_operation_statistics().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing(args: &Args) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// 参照データ（カテゴリ・仕入先）と商品をバルク import
async fn seed(app: &App, count: usize) -> anyhow::Result<()> {
    let categories = vec![
        Category {
            name: "เครื่องปรุง".into(),
            description: Some("ซอสและเครื่องปรุงรส".into()),
        },
        Category {
            name: "เครื่องดื่ม".into(),
            description: None,
        },
    ];
    let suppliers = vec![Supplier {
        name: "บริษัท สยามฟู้ด จำกัด".into(),
        contact_person: Some("คุณสมชาย".into()),
        phone: Some("02-123-4567".into()),
        email: None,
    }];

    let result = app.import_records(categories, None).await;
    anyhow::ensure!(result.failure_count == 0, "category import failed: {:?}", result.failed);
    let result = app.import_records(suppliers, None).await;
    anyhow::ensure!(result.failure_count == 0, "supplier import failed: {:?}", result.failed);

    let category_ids = ids_by_name(&app.queries.get_categories_cached().await?);
    let supplier_ids = ids_by_name(&app.queries.get_suppliers_cached().await?);
    let sauce = category_ids
        .get("เครื่องปรุง")
        .context("seeded category missing")?;
    let drinks = category_ids
        .get("เครื่องดื่ม")
        .context("seeded category missing")?;
    let supplier = supplier_ids.values().next().context("seeded supplier missing")?;

    let products: Vec<Product> = (0..count)
        .map(|i| Product {
            sku: format!("TH-{:04}", i + 1),
            name: format!("สินค้า {}", i + 1),
            category: if i % 2 == 0 { sauce.clone() } else { drinks.clone() },
            supplier: supplier.clone(),
            current_stock: (i as i64 * 7) % 40,
            min_stock: 5,
            unit_price: 15.0 + (i % 5) as f64 * 10.0,
            barcode: None,
        })
        .collect();

    let mut report = |done: usize, total: usize| {
        if done % 10 == 0 || done == total {
            tracing::info!(done, total, "importing products");
        }
    };
    let result = app.import_records(products, Some(&mut report)).await;
    tracing::info!(
        run_id = %result.run_id,
        status = %result.status,
        success = result.success_count,
        failed = result.failure_count,
        "product import finished"
    );
    Ok(())
}

fn ids_by_name(docs: &[Document]) -> HashMap<String, String> {
    docs.iter()
        .filter_map(|doc| {
            doc.str_field("name")
                .map(|name| (name.to_string(), doc.id.as_str().to_string()))
        })
        .collect()
}

/// 先頭から最後のページまで順に取得
async fn walk_products(app: &App) -> anyhow::Result<usize> {
    let filters = ProductFilters::new();
    let mut cursor: Option<Cursor> = None;
    let mut pages = 0;
    loop {
        let page = app
            .queries
            .get_products_paginated(None, cursor.as_ref(), &filters)
            .await?;
        pages += 1;
        let skus: Vec<&str> = page
            .items
            .iter()
            .filter_map(|doc| doc.str_field(fields::SKU))
            .collect();
        tracing::info!(page = pages, items = page.len(), has_more = page.has_more, ?skus, "products page");
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(pages)
}

/// 低在庫の商品を 1 回のバッチで補充
async fn restock_low_stock(app: &App, amount: i64) -> anyhow::Result<usize> {
    let mut low = Vec::new();
    let mut cursor: Option<Cursor> = None;
    loop {
        let page = app
            .queries
            .get_low_stock_products(None, None, cursor.as_ref())
            .await?;
        low.extend(page.items);
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    for doc in &low {
        let stock = doc.number_field(fields::CURRENT_STOCK).unwrap_or(0.0) as i64;
        let mut payload = Fields::new();
        payload.insert(fields::CURRENT_STOCK.to_string(), json!(stock + amount));
        app.add_batch_operation(BatchOperation::update(
            collections::PRODUCTS,
            doc.id.clone(),
            payload,
        ))
        .await?;
    }
    let summary = app.commit_batch().await?;
    tracing::info!(
        commit_id = ?summary.commit_id,
        updated = summary.updated,
        "restock committed"
    );
    Ok(low.len())
}
