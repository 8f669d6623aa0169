//! 同步状态跟踪 - 基于校验和的幂等重同步
//!
//! 记录存放在设置文件的 `claude_sync.synced_files` / `amp_sync.synced_threads` 中，
//! 以绝对路径为键。读取失败时按「未同步」处理（宁可重复上报，也不丢数据）。

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SyncRecord, SyncSource};
use crate::error::{ArdenError, Result};
use crate::settings::SettingsStore;
use crate::utils::time::now_rfc3339;

/// 单一来源的同步状态跟踪器
pub struct SyncStateTracker {
    settings: Arc<SettingsStore>,
    source: SyncSource,
}

impl SyncStateTracker {
    pub fn new(settings: Arc<SettingsStore>, source: SyncSource) -> Self {
        Self { settings, source }
    }

    pub fn source(&self) -> SyncSource {
        self.source
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// 该路径是否已按相同校验和同步过
    pub async fn is_synced(&self, path: &Path, checksum: &str) -> bool {
        let key = Self::key(path);
        match self.settings.load().await {
            Ok(settings) => settings
                .sync_records(self.source)
                .iter()
                .any(|record| record.path == key && record.checksum == checksum),
            Err(e) => {
                warn!(
                    "⚠️ 读取同步状态失败，按未同步处理: source={}, path={}, error={}",
                    self.source.as_str(),
                    key,
                    e
                );
                false
            }
        }
    }

    /// 查询某路径的记录
    pub async fn record_for(&self, path: &Path) -> Option<SyncRecord> {
        let key = Self::key(path);
        let settings = self.settings.load().await.ok()?;
        settings
            .sync_records(self.source)
            .iter()
            .find(|record| record.path == key)
            .cloned()
    }

    /// 记录一次成功同步（同一路径的旧记录被替换）
    pub async fn record_synced(&self, path: &Path, checksum: &str, events_processed: u64) -> Result<()> {
        let key = Self::key(path);
        let now = now_rfc3339();
        let source = self.source;

        let record = SyncRecord {
            path: key.clone(),
            checksum: checksum.to_string(),
            last_modified: now.clone(),
            events_processed,
        };

        self.settings
            .update(move |settings| {
                let records = settings.sync_records_mut(source);
                records.retain(|existing| existing.path != record.path);
                records.push(record);
                settings.set_last_sync(source, now);
            })
            .await
            .map_err(|e| ArdenError::State(format!("写入同步记录失败 {}: {}", key, e)))?;

        debug!(
            "同步状态已更新: source={}, path={}, events={}",
            self.source.as_str(),
            key,
            events_processed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir, source: SyncSource) -> (SyncStateTracker, Arc<SettingsStore>) {
        let store = Arc::new(SettingsStore::open(dir.path().join("settings.json")));
        (SyncStateTracker::new(store.clone(), source), store)
    }

    #[tokio::test]
    async fn record_is_idempotent_per_path() {
        let dir = TempDir::new().unwrap();
        let (tracker, store) = tracker(&dir, SyncSource::Claude);
        let path = Path::new("/home/u/.claude/projects/p/session.jsonl");

        tracker.record_synced(path, "abc", 7).await.unwrap();
        assert!(tracker.is_synced(path, "abc").await);
        let first = tracker.record_for(path).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        tracker.record_synced(path, "abc", 7).await.unwrap();
        assert!(tracker.is_synced(path, "abc").await);

        let settings = SettingsStore::open(store.path()).load().await.unwrap();
        let records = settings.sync_records(SyncSource::Claude);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].events_processed, 7);
        assert!(records[0].last_modified >= first.last_modified);
        assert_eq!(settings.last_sync(SyncSource::Claude), Some(records[0].last_modified.as_str()));
    }

    #[tokio::test]
    async fn changed_checksum_invalidates() {
        let dir = TempDir::new().unwrap();
        let (tracker, _) = tracker(&dir, SyncSource::Amp);
        let path = Path::new("/home/u/.local/share/amp/file-changes/T-1");

        tracker.record_synced(path, "checksum-a", 3).await.unwrap();
        assert!(!tracker.is_synced(path, "checksum-b").await);
        assert!(!tracker.is_synced(Path::new("/other"), "checksum-a").await);

        tracker.record_synced(path, "checksum-b", 5).await.unwrap();
        assert!(tracker.is_synced(path, "checksum-b").await);
        assert!(!tracker.is_synced(path, "checksum-a").await);
        assert_eq!(tracker.record_for(path).await.unwrap().events_processed, 5);
    }

    #[tokio::test]
    async fn sources_are_kept_apart() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SettingsStore::open(dir.path().join("settings.json")));
        let claude = SyncStateTracker::new(store.clone(), SyncSource::Claude);
        let amp = SyncStateTracker::new(store.clone(), SyncSource::Amp);
        let path = Path::new("/shared/path");

        claude.record_synced(path, "x", 1).await.unwrap();
        assert!(claude.is_synced(path, "x").await);
        assert!(!amp.is_synced(path, "x").await);
    }

    #[tokio::test]
    async fn unreadable_state_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{ corrupt").unwrap();
        let tracker = SyncStateTracker::new(Arc::new(SettingsStore::open(&path)), SyncSource::Claude);

        assert!(!tracker.is_synced(Path::new("/any"), "abc").await);
        assert!(tracker.record_for(Path::new("/any")).await.is_none());
        // 写入同样失败，由调用方决定如何处理
        assert!(matches!(
            tracker.record_synced(Path::new("/any"), "abc", 1).await,
            Err(ArdenError::State(_))
        ));
    }
}
