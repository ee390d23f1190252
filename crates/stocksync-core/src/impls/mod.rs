//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryDocumentStore**: 開発・テスト用のドキュメントストア
//!
//! 本番のホスティング DB クライアントはこのクレートの外で `DocumentStore` を実装します。

pub mod inmem_store;

pub use self::inmem_store::InMemoryDocumentStore;
