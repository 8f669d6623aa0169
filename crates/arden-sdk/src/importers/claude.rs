//! Claude Code 导入器
//!
//! 来源：`~/.claude/projects/**/*.jsonl`，每个文件是一个会话，每行一条日志。
//! 只有带 `message.usage` 的 assistant 日志会转换为事件；同一条消息可能因为
//! 流式输出被多次写入，按 (message.id, requestId) 去重。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use super::SourceImporter;
use crate::agents::AgentKind;
use crate::error::{ArdenError, Result};
use crate::sync::SyncSource;
use crate::utils::time::parse_rfc3339_millis;

/// 单行日志中关心的字段
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    timestamp: Option<String>,
    session_id: Option<String>,
    request_id: Option<String>,
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    id: Option<String>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

pub struct ClaudeImporter {
    projects_dir: PathBuf,
}

impl ClaudeImporter {
    /// `home` 为用户主目录
    pub fn new(home: &Path) -> Self {
        Self {
            projects_dir: AgentKind::ClaudeCode.data_dir(home),
        }
    }

    pub fn with_projects_dir(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }
}

#[async_trait]
impl SourceImporter for ClaudeImporter {
    fn source(&self) -> SyncSource {
        SyncSource::Claude
    }

    async fn discover_sources(&self) -> Result<Vec<PathBuf>> {
        let root = self.projects_dir.clone();
        tokio::task::spawn_blocking(move || {
            if !root.is_dir() {
                debug!("Claude 项目目录不存在: {}", root.display());
                return Ok(Vec::new());
            }
            let mut sources = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry.map_err(|e| ArdenError::IO(format!("遍历 Claude 项目目录失败: {}", e)))?;
                let is_jsonl = entry.path().extension().is_some_and(|ext| ext == "jsonl");
                if entry.file_type().is_file() && is_jsonl {
                    sources.push(entry.into_path());
                }
            }
            Ok(sources)
        })
        .await
        .map_err(|e| ArdenError::IO(format!("遍历任务失败: {}", e)))?
    }

    async fn read_events(&self, source: &Path) -> Result<Vec<Value>> {
        let content = tokio::fs::read_to_string(source).await?;
        Ok(events_from_log(&content))
    }
}

/// 把会话日志转换为候选事件
fn events_from_log(content: &str) -> Vec<Value> {
    let agent = AgentKind::ClaudeCode.agent_id();
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
            continue;
        };
        if entry.kind.as_deref() != Some("assistant") {
            continue;
        }
        let Some(message) = entry.message else {
            continue;
        };
        let Some(usage) = message.usage else {
            continue;
        };
        let Some(time) = entry.timestamp.as_deref().and_then(parse_rfc3339_millis) else {
            continue;
        };

        if let (Some(id), Some(request_id)) = (&message.id, &entry.request_id) {
            if !seen.insert((id.clone(), request_id.clone())) {
                continue;
            }
        }

        let mut data = json!({
            "in": usage.input_tokens,
            "out": usage.output_tokens,
            "cw": usage.cache_creation_input_tokens,
            "cr": usage.cache_read_input_tokens,
        });
        if let Some(model) = message.model {
            data["model"] = Value::String(model);
        }
        if let Some(session) = entry.session_id {
            data["session"] = Value::String(session);
        }

        events.push(json!({
            "agent": agent,
            "time": time,
            "bid": usage.input_tokens + usage.output_tokens,
            "mult": 1,
            "data": data,
        }));
    }
    events
}
