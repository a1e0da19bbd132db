//! Ports - 抽象化レイヤー
//!
//! エンジンが外部とやり取りする境界を trait で定義します。
//! 実装は `impls` に置きます。
//!
//! - タスクパッケージの読み込み（TaskMetadataSource）
//! - タスクハンドラのランタイム（TaskHandler）
//! - プラグインのレジストリ（PluginRegistry）
//! - フィードバックの出力先（FeedbackSink）
//! - 時刻と ID（Clock, IdGenerator）

pub mod clock;
pub mod feedback;
pub mod id_generator;
pub mod metadata_source;
pub mod plugin;
pub mod task_handler;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::feedback::FeedbackSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::metadata_source::TaskMetadataSource;
pub use self::plugin::{Plugin, PluginHook, PluginRegistry, PluginSet};
pub use self::task_handler::{HandlerRegistry, RegistryError, TaskHandler};
