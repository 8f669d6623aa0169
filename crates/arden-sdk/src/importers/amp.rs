//! Amp 导入器
//!
//! 来源：`~/.local/share/amp/file-changes/<thread-id>/`，每个线程一个目录，
//! 目录下每个 JSON 文件是一条文件变更记录。每条记录转换为一个事件，
//! bid 为增删行数之和。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::SourceImporter;
use crate::agents::AgentKind;
use crate::error::Result;
use crate::sync::SyncSource;
use crate::utils::time::system_time_millis;

/// 文件变更记录
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileChange {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    diff: String,
    #[serde(default)]
    is_new_file: bool,
    #[serde(default)]
    reverted: bool,
    /// 毫秒时间戳
    timestamp: Option<u64>,
}

pub struct AmpImporter {
    changes_dir: PathBuf,
}

impl AmpImporter {
    pub fn new(home: &Path) -> Self {
        Self {
            changes_dir: AgentKind::Amp.data_dir(home),
        }
    }

    pub fn with_changes_dir(changes_dir: PathBuf) -> Self {
        Self { changes_dir }
    }
}

#[async_trait]
impl SourceImporter for AmpImporter {
    fn source(&self) -> SyncSource {
        SyncSource::Amp
    }

    async fn discover_sources(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.changes_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Amp 变更目录不存在: {}", self.changes_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut threads = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                threads.push(entry.path());
            }
        }
        threads.sort();
        Ok(threads)
    }

    async fn read_events(&self, source: &Path) -> Result<Vec<Value>> {
        let thread = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(source).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                let modified = metadata.modified().map(system_time_millis).unwrap_or(0);
                files.push((entry.path(), modified));
            }
        }
        files.sort();

        let mut events = Vec::with_capacity(files.len());
        for (path, modified) in files {
            let bytes = tokio::fs::read(&path).await?;
            let Ok(change) = serde_json::from_slice::<FileChange>(&bytes) else {
                debug!("跳过无法解析的变更记录: {}", path.display());
                continue;
            };
            events.push(change_event(&thread, &change, modified));
        }
        Ok(events)
    }
}

fn change_event(thread: &str, change: &FileChange, fallback_time: u64) -> Value {
    let (added, removed) = count_diff_lines(&change.diff);
    json!({
        "agent": AgentKind::Amp.agent_id(),
        "time": change.timestamp.unwrap_or(fallback_time),
        "bid": added + removed,
        "mult": 1,
        "data": {
            "thread": thread,
            "ext": file_extension(&change.uri),
            "add": added,
            "del": removed,
            "new": u8::from(change.is_new_file),
            "rev": u8::from(change.reverted),
        },
    })
}

/// 统计 unified diff 的增删行（忽略 `+++` / `---` 文件头）
fn count_diff_lines(diff: &str) -> (u64, u64) {
    diff.lines().fold((0, 0), |(added, removed), line| {
        if line.starts_with("+++") || line.starts_with("---") {
            (added, removed)
        } else if line.starts_with('+') {
            (added + 1, removed)
        } else if line.starts_with('-') {
            (added, removed + 1)
        } else {
            (added, removed)
        }
    })
}

fn file_extension(uri: &str) -> String {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}
