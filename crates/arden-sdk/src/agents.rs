//! 本地智能体检测

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::importers::{AmpImporter, ClaudeImporter, SourceImporter};
use crate::sync::SyncSource;

/// 支持的智能体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ClaudeCode,
    Amp,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::ClaudeCode, AgentKind::Amp];

    /// 上报时使用的十六进制 agent id
    pub fn agent_id(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "A-C1A0DE",
            AgentKind::Amp => "A-A3B",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "Claude Code",
            AgentKind::Amp => "Amp",
        }
    }

    /// 本地数据目录
    pub fn data_dir(&self, home: &Path) -> PathBuf {
        match self {
            AgentKind::ClaudeCode => home.join(".claude").join("projects"),
            AgentKind::Amp => home.join(".local").join("share").join("amp").join("file-changes"),
        }
    }

    pub fn sync_source(&self) -> SyncSource {
        match self {
            AgentKind::ClaudeCode => SyncSource::Claude,
            AgentKind::Amp => SyncSource::Amp,
        }
    }

    /// 该智能体的导入器
    pub fn importer(&self, home: &Path) -> Box<dyn SourceImporter> {
        match self {
            AgentKind::ClaudeCode => Box::new(ClaudeImporter::new(home)),
            AgentKind::Amp => Box::new(AmpImporter::new(home)),
        }
    }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedAgent {
    pub kind: AgentKind,
    pub data_dir: PathBuf,
    pub installed: bool,
}

/// 检测所有支持的智能体；数据目录存在即视为已安装
pub async fn detect_agents(home: &Path) -> Vec<DetectedAgent> {
    let mut detected = Vec::with_capacity(AgentKind::ALL.len());
    for kind in AgentKind::ALL {
        let data_dir = kind.data_dir(home);
        let installed = tokio::fs::metadata(&data_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        debug!("检测 {}: installed={}, dir={}", kind.display_name(), installed, data_dir.display());
        detected.push(DetectedAgent {
            kind,
            data_dir,
            installed,
        });
    }
    detected
}
