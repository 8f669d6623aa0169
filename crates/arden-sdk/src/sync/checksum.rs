//! 校验和计算
//!
//! - 文件：对文件内容做 SHA-256
//! - 目录：按字典序遍历，依次折叠每个条目的相对路径；对文件额外折叠
//!   修改时间与大小（`Metadata`，默认）或内容摘要（`Content`）
//!
//! `Metadata` 模式下目录校验和只是结构/元数据指纹：文件内容变化但大小与
//! mtime 恰好不变时，校验和不会变化。

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{ArdenError, Result};
use crate::utils::time::system_time_millis;

/// 目录校验模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumMode {
    /// 相对路径 + mtime + 大小
    #[default]
    Metadata,
    /// 相对路径 + 文件内容
    Content,
}

/// 文件内容的 SHA-256（hex）
pub async fn compute_file_checksum(path: &Path) -> Result<String> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ArdenError::IO(format!("读取文件内容失败 {}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// 目录指纹（在阻塞线程池中遍历）
pub async fn compute_directory_checksum(path: &Path, mode: ChecksumMode) -> Result<String> {
    let root = path.to_path_buf();
    tokio::task::spawn_blocking(move || directory_checksum_blocking(&root, mode))
        .await
        .map_err(|e| ArdenError::IO(format!("目录校验任务失败: {}", e)))?
}

/// 按路径类型分派：目录走目录指纹，其余按文件内容
pub async fn compute_checksum(path: &Path, mode: ChecksumMode) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ArdenError::IO(format!("读取元数据失败 {}: {}", path.display(), e)))?;

    if metadata.is_dir() {
        compute_directory_checksum(path, mode).await
    } else {
        compute_file_checksum(path).await
    }
}

fn directory_checksum_blocking(root: &Path, mode: ChecksumMode) -> Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArdenError::IO(format!("遍历目录失败 {}: {}", root.display(), e)))?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        // 统一使用 '/' 分隔，保证跨平台指纹一致
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        hasher.update(relative.as_bytes());
        hasher.update([0u8]);

        if entry.file_type().is_file() {
            match mode {
                ChecksumMode::Metadata => {
                    let metadata = entry
                        .metadata()
                        .map_err(|e| ArdenError::IO(format!("读取元数据失败 {}: {}", relative, e)))?;
                    let mtime = metadata.modified().map(system_time_millis).unwrap_or(0);
                    hasher.update(mtime.to_le_bytes());
                    hasher.update(metadata.len().to_le_bytes());
                }
                ChecksumMode::Content => {
                    let content = std::fs::read(entry.path())?;
                    hasher.update(Sha256::digest(&content));
                }
            }
        }
        hasher.update(b"\n");
    }

    Ok(hex::encode(hasher.finalize()))
}
