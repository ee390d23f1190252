//! stocksync-core
//!
//! 在庫管理アプリのバルク / バッチ同期レイヤー。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, document, batch operation, inventory, errors）
//! - **ports**: 抽象化レイヤー（DocumentStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryDocumentStore）
//! - **cache**: TTL 付きキャッシュ（DataCache）
//! - **query**: ページング付きクエリ（OptimizedQueries）
//! - **batch**: 書き込みの accumulator（BatchOperations）
//! - **bulk**: バルク実行とレジストリ（BulkOperationService）
//! - **config**: 設定（SyncConfig）
//! - **app**: 構築とワイヤリング（AppBuilder）

pub mod app;
pub mod batch;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod query;

pub use app::{App, AppBuilder, BuildError};
pub use config::SyncConfig;
