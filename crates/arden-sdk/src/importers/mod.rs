//! 本地日志导入
//!
//! 每个导入器负责一种智能体的本地数据：发现来源（文件或目录）并把来源内容
//! 转换为候选事件。`run_import` 串起完整流程：
//!
//! 校验和 → 已同步则跳过 → 读取 → 附加 user → 校验 → 投递 → 记录同步状态
//!
//! 来源按发现顺序串行处理；投递失败立即返回（不在此层重试），已记录的来源
//! 下次运行会被跳过。

pub mod amp;
pub mod claude;

pub use amp::AmpImporter;
pub use claude::ClaudeImporter;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryClient;
use crate::error::Result;
use crate::schema::{validate_event, validate_user_id, TelemetryEvent};
use crate::sync::{compute_checksum, ChecksumMode, SyncSource, SyncStateTracker};

/// 本地来源导入器
#[async_trait]
pub trait SourceImporter: Send + Sync {
    /// 同步状态所属的来源类型
    fn source(&self) -> SyncSource;

    /// 目录来源使用的校验模式
    fn checksum_mode(&self) -> ChecksumMode {
        ChecksumMode::Metadata
    }

    /// 列出所有来源（绝对路径，稳定顺序）；数据目录不存在时返回空列表
    async fn discover_sources(&self) -> Result<Vec<PathBuf>>;

    /// 读取单个来源，返回未附加 user 的候选事件
    async fn read_events(&self, source: &Path) -> Result<Vec<Value>>;
}

/// 导入选项
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// 附加到每个事件上的用户 ULID
    pub user_id: Option<String>,
    /// 忽略同步状态，重新上报所有来源
    pub force: bool,
}

/// 一次导入的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub sources_found: usize,
    pub sources_skipped: usize,
    pub sources_synced: usize,
    /// 校验和计算、读取失败，或事件全部未通过校验的来源
    pub sources_failed: usize,
    pub events_sent: u64,
    pub events_accepted: u64,
    pub events_rejected: u64,
    /// 本地校验未通过而丢弃的事件
    pub events_dropped: u64,
}

/// 执行一次导入
pub async fn run_import(
    importer: &dyn SourceImporter,
    tracker: &SyncStateTracker,
    client: &DeliveryClient,
    options: &ImportOptions,
) -> Result<SyncReport> {
    // user 非法时所有事件都会被丢弃，必须在处理任何来源之前失败
    if let Some(user) = options.user_id.as_deref() {
        validate_user_id(user)?;
    }

    let source = importer.source();
    let sources = importer.discover_sources().await?;
    let mut report = SyncReport {
        sources_found: sources.len(),
        ..Default::default()
    };
    info!("🔄 开始导入: source={}, 来源数={}", source.as_str(), sources.len());

    for path in sources {
        let checksum = match compute_checksum(&path, importer.checksum_mode()).await {
            Ok(checksum) => checksum,
            Err(e) => {
                warn!("⚠️ 计算校验和失败，跳过 {}: {}", path.display(), e);
                report.sources_failed += 1;
                continue;
            }
        };

        if !options.force && tracker.is_synced(&path, &checksum).await {
            debug!("来源未变化，跳过: {}", path.display());
            report.sources_skipped += 1;
            continue;
        }

        let candidates = match importer.read_events(&path).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("⚠️ 读取来源失败，跳过 {}: {}", path.display(), e);
                report.sources_failed += 1;
                continue;
            }
        };

        let (events, dropped) = prepare_events(candidates, options.user_id.as_deref(), &path);
        report.events_dropped += dropped;

        // 有候选但全部被丢弃：不记录，来源修复后下次仍会上报
        if events.is_empty() && dropped > 0 {
            warn!("⚠️ 来源中的事件全部未通过校验，不记录同步状态: {}", path.display());
            report.sources_failed += 1;
            continue;
        }

        if !events.is_empty() {
            let result = client.send_events(&events).await?;
            report.events_sent += events.len() as u64;
            report.events_accepted = report.events_accepted.saturating_add(result.accepted_count);
            report.events_rejected = report.events_rejected.saturating_add(result.rejected_count);
            if !result.is_fully_accepted() {
                warn!(
                    "⚠️ 服务端拒绝部分事件: {}, accepted={}, rejected={}",
                    path.display(),
                    result.accepted_count,
                    result.rejected_count
                );
            }
        }

        // 事件已送达，状态写入失败只会导致下次重复上报
        if let Err(e) = tracker.record_synced(&path, &checksum, events.len() as u64).await {
            warn!("⚠️ {}", e);
        }
        report.sources_synced += 1;
    }

    info!(
        "✅ 导入完成: source={}, synced={}, skipped={}, failed={}, events={}",
        source.as_str(),
        report.sources_synced,
        report.sources_skipped,
        report.sources_failed,
        report.events_sent
    );
    Ok(report)
}

/// 附加 user 并逐个校验；未通过的事件被丢弃并计数
fn prepare_events(candidates: Vec<Value>, user_id: Option<&str>, path: &Path) -> (Vec<TelemetryEvent>, u64) {
    let mut events = Vec::with_capacity(candidates.len());
    let mut dropped = 0;

    for mut candidate in candidates {
        if let (Some(user), Some(object)) = (user_id, candidate.as_object_mut()) {
            object.insert("user".to_string(), Value::String(user.to_string()));
        }
        match validate_event(&candidate) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!("⚠️ 丢弃非法事件 {}: {}", path.display(), e);
                dropped += 1;
            }
        }
    }
    (events, dropped)
}
