//! App - アプリケーション層
//!
//! ports と各サービスを組み合わせて、呼び出し側（画面のコード）に渡す App を作ります。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 構築とワイヤリング、設定の検証
//! - **App**: DataCache / OptimizedQueries / BatchOperations / BulkOperationService の束

pub mod builder;

pub use self::builder::{App, AppBuilder, BuildError};
