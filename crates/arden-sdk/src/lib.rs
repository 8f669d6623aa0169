//! Arden SDK - AI 编码智能体用量统计客户端核心
//!
//! 本 SDK 负责：
//! - 🔍 检测本地安装的智能体（Claude Code、Amp）
//! - 📥 读取本地日志并转换为遥测事件
//! - ✅ 事件结构校验（agent / user / time / bid / mult / data）
//! - 📤 分块投递（每块 100 条，超过 1 MiB 自动 gzip）
//! - 🔁 基于校验和的幂等重同步
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arden_sdk::{
//!     run_import, ClaudeImporter, DeliveryClient, ImportOptions, SettingsStore, SyncSource,
//!     SyncStateTracker,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SettingsStore::open(SettingsStore::default_path()));
//!     let settings = store.load().await?.with_env_overrides();
//!
//!     let client = DeliveryClient::new(settings.delivery_config())?;
//!     let tracker = SyncStateTracker::new(store.clone(), SyncSource::Claude);
//!     let importer = ClaudeImporter::new(std::path::Path::new("/home/me"));
//!
//!     let options = ImportOptions { user_id: settings.user_id.clone(), ..Default::default() };
//!     let report = run_import(&importer, &tracker, &client, &options).await?;
//!     println!("已上报 {} 个事件", report.events_sent);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod delivery;
pub mod error;
pub mod importers;
pub mod schema;
pub mod settings;
pub mod sync;
pub mod utils;
pub mod version;

pub use agents::{detect_agents, AgentKind, DetectedAgent};
pub use delivery::{
    send_telemetry, DeliveryClient, DeliveryConfig, DeliveryConfigBuilder, DeliveryResult, DeliveryStatus,
    HttpTransport, RejectedEvent,
};
pub use error::{ArdenError, Result};
pub use importers::{run_import, AmpImporter, ClaudeImporter, ImportOptions, SourceImporter, SyncReport};
pub use schema::{
    build_event, normalize_agent_id, validate_event, validate_events, validate_user_id, EventData, PartialEvent,
    SchemaError, TelemetryEvent,
};
pub use settings::{Settings, SettingsStore};
pub use sync::{ChecksumMode, SyncRecord, SyncSource, SyncStateTracker};
pub use version::{user_agent, SDK_VERSION};
