//! 本地同步状态模块
//!
//! 职责：
//! - 计算文件/目录校验和（checksum）
//! - 记录每个来源（文件或目录）最近一次成功上报时的校验和
//! - 在重复同步时判断来源是否未变化，从而跳过

pub mod checksum;
pub mod state_tracker;

pub use checksum::{compute_checksum, compute_directory_checksum, compute_file_checksum, ChecksumMode};
pub use state_tracker::SyncStateTracker;

use serde::{Deserialize, Serialize};

/// 同步来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    /// Claude Code JSONL 会话文件
    Claude,
    /// Amp 线程目录
    Amp,
}

impl SyncSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSource::Claude => "claude",
            SyncSource::Amp => "amp",
        }
    }
}

/// 单个来源的同步记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// 文件或目录的绝对路径
    pub path: String,
    pub checksum: String,
    /// RFC 3339
    pub last_modified: String,
    pub events_processed: u64,
}
