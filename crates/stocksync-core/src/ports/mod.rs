//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（ホスティングされたドキュメント DB、時計、ID 生成）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//! サービスはすべて `Arc<dyn ...>` で受け取るので、テストでは差し替えられます。

pub mod clock;
pub mod document_store;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{DocumentStore, MAX_BATCH_WRITES};
pub use self::id_generator::{IdGenerator, UlidGenerator};
