//! 本地设置存储
//!
//! 设置文件为单个 JSON 文档（默认 `~/.arden/settings.json`），包含：
//! - 连接信息：host、token、user_id
//! - 同步状态：`claude_sync`、`amp_sync`
//! - 其他 CLI 偏好项（原样保留）
//!
//! 每次保存都是整文档的读-改-写（临时文件 + rename）；跨进程不加锁，后写者覆盖先写者。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::delivery::DeliveryConfig;
use crate::error::{ArdenError, Result};
use crate::sync::{SyncRecord, SyncSource};

/// 设置目录环境变量
pub const CONFIG_DIR_ENV: &str = "ARDEN_CONFIG_DIR";
const SETTINGS_FILE: &str = "settings.json";

/// Claude Code 同步状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaudeSyncState {
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub synced_files: Vec<SyncRecord>,
}

/// Amp 同步状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmpSyncState {
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub synced_threads: Vec<SyncRecord>,
}

/// 设置文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_sync: Option<ClaudeSyncState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp_sync: Option<AmpSyncState>,
    /// 其他偏好项
    #[serde(flatten)]
    pub preferences: Map<String, Value>,
}

impl Settings {
    /// 用环境变量覆盖（ARDEN_HOST / ARDEN_TOKEN / ARDEN_USER_ID），结果不落盘
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = non_empty("ARDEN_HOST") {
            self.host = Some(host);
        }
        if let Some(token) = non_empty("ARDEN_TOKEN") {
            self.token = Some(token);
        }
        if let Some(user_id) = non_empty("ARDEN_USER_ID") {
            self.user_id = Some(user_id);
        }
        self
    }

    /// 由设置推导投递配置
    pub fn delivery_config(&self) -> DeliveryConfig {
        let mut builder = DeliveryConfig::builder().token(self.token.clone());
        if let Some(host) = &self.host {
            builder = builder.host(host.clone());
        }
        builder.build()
    }

    /// 指定来源的同步记录
    pub fn sync_records(&self, source: SyncSource) -> &[SyncRecord] {
        match source {
            SyncSource::Claude => self
                .claude_sync
                .as_ref()
                .map(|s| s.synced_files.as_slice())
                .unwrap_or(&[]),
            SyncSource::Amp => self
                .amp_sync
                .as_ref()
                .map(|s| s.synced_threads.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn sync_records_mut(&mut self, source: SyncSource) -> &mut Vec<SyncRecord> {
        match source {
            SyncSource::Claude => &mut self.claude_sync.get_or_insert_with(Default::default).synced_files,
            SyncSource::Amp => &mut self.amp_sync.get_or_insert_with(Default::default).synced_threads,
        }
    }

    pub fn last_sync(&self, source: SyncSource) -> Option<&str> {
        match source {
            SyncSource::Claude => self.claude_sync.as_ref().and_then(|s| s.last_sync.as_deref()),
            SyncSource::Amp => self.amp_sync.as_ref().and_then(|s| s.last_sync.as_deref()),
        }
    }

    pub fn set_last_sync(&mut self, source: SyncSource, timestamp: String) {
        match source {
            SyncSource::Claude => {
                self.claude_sync.get_or_insert_with(Default::default).last_sync = Some(timestamp)
            }
            SyncSource::Amp => {
                self.amp_sync.get_or_insert_with(Default::default).last_sync = Some(timestamp)
            }
        }
    }
}

/// 设置存储（显式传递，不使用进程级全局状态）
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    /// 最近一次读/写的文档
    cache: RwLock<Option<Settings>>,
    /// 进程内串行化读-改-写
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// 默认设置文件路径：$ARDEN_CONFIG_DIR/settings.json 或 ~/.arden/settings.json
    pub fn default_path() -> PathBuf {
        if let Some(dir) = std::env::var(CONFIG_DIR_ENV).ok().filter(|d| !d.is_empty()) {
            return PathBuf::from(dir).join(SETTINGS_FILE);
        }
        if let Some(home) = home_dir() {
            home.join(".arden").join(SETTINGS_FILE)
        } else {
            // 无法获取用户主目录时回退到当前目录
            PathBuf::from("./.arden").join(SETTINGS_FILE)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置（优先使用缓存）；文件不存在时返回默认值
    pub async fn load(&self) -> Result<Settings> {
        if let Some(settings) = self.cache.read().await.as_ref() {
            return Ok(settings.clone());
        }
        self.reload().await
    }

    /// 绕过缓存重新读取磁盘
    pub async fn reload(&self) -> Result<Settings> {
        let settings = match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Settings::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ArdenError::Settings(format!("解析设置文件失败 {}: {}", self.path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("设置文件不存在，使用默认值: {}", self.path.display());
                Settings::default()
            }
            Err(e) => {
                return Err(ArdenError::Settings(format!(
                    "读取设置文件失败 {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        *self.cache.write().await = Some(settings.clone());
        Ok(settings)
    }

    /// 整文档写入
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_file(settings).await
    }

    /// 读-改-写：重新读取磁盘、修改、保存
    pub async fn update<F, T>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Settings) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.reload().await?;
        let output = mutate(&mut settings);
        self.write_file(&settings).await?;
        Ok(output)
    }

    async fn write_file(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArdenError::Settings(format!("创建设置目录失败: {}", e)))?;
        }

        let bytes = serde_json::to_vec_pretty(settings)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| ArdenError::Settings(format!("写入设置文件失败: {}", e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| ArdenError::Settings(format!("替换设置文件失败: {}", e)))?;

        *self.cache.write().await = Some(settings.clone());
        info!("💾 设置已保存: {}", self.path.display());
        Ok(())
    }
}

/// 用户主目录（HOME，Windows 下回退 USERPROFILE）
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
