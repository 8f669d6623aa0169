//! 事件投递客户端
//!
//! 流程：防御性重新校验 → 按 100 条分块 → 逐块串行 POST → 聚合结果。
//! 单条分块以裸对象发送，多条以 JSON 数组发送；超过 1 MiB 的请求体 gzip 压缩。

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::delivery::config::DeliveryConfig;
use crate::delivery::result::{ChunkResponse, DeliveryResult};
use crate::delivery::transport::{HttpTransport, ReqwestTransport, TransportRequest};
use crate::error::{ArdenError, Result};
use crate::schema::{validate_events, TelemetryEvent};

/// 每个分块的最大事件数
pub const CHUNK_SIZE: usize = 100;
/// 请求体超过该字节数时启用 gzip
pub const COMPRESSION_THRESHOLD: usize = 1024 * 1024;

/// 投递客户端
pub struct DeliveryClient {
    config: DeliveryConfig,
    transport: Arc<dyn HttpTransport>,
}

impl DeliveryClient {
    /// 使用默认的 reqwest 传输创建客户端
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        info!("✅ 投递客户端已创建 (endpoint: {})", config.endpoint_url());
        Ok(Self { config, transport })
    }

    /// 注入自定义传输层
    pub fn with_transport(config: DeliveryConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// 投递一批事件，返回聚合结果
    ///
    /// 分块严格按输入顺序逐个发送。某个分块失败时返回
    /// `ArdenError::DeliveryAborted`，其中带有失败分块的序号以及此前已投递分块的聚合结果。
    pub async fn send_events(&self, events: &[TelemetryEvent]) -> Result<DeliveryResult> {
        for (index, event) in events.iter().enumerate() {
            event.validate().map_err(|e| e.at_index(index))?;
        }

        let mut result = DeliveryResult::default();
        if events.is_empty() {
            debug!("没有需要投递的事件");
            return Ok(result);
        }

        let chunk_total = events.len().div_ceil(CHUNK_SIZE);
        info!("📤 开始投递 {} 个事件，共 {} 个分块", events.len(), chunk_total);

        for (chunk_index, chunk) in events.chunks(CHUNK_SIZE).enumerate() {
            match self.send_chunk(chunk).await {
                Ok(response) => {
                    debug!(
                        "分块 {}/{} 已投递: accepted={}, rejected={}",
                        chunk_index + 1,
                        chunk_total,
                        response.accepted_count,
                        response.effective_rejected_count()
                    );
                    result.merge_chunk(response);
                }
                Err(e) => {
                    error!("❌ 分块 {}/{} 投递失败: {}", chunk_index + 1, chunk_total, e);
                    return Err(ArdenError::DeliveryAborted {
                        chunk_index,
                        delivered: Box::new(result),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            "✅ 投递完成: status={:?}, accepted={}, rejected={}",
            result.status, result.accepted_count, result.rejected_count
        );
        Ok(result)
    }

    async fn send_chunk(&self, chunk: &[TelemetryEvent]) -> Result<ChunkResponse> {
        let (body, compressed) = encode_chunk(chunk)?;
        let response = self
            .transport
            .post(TransportRequest {
                url: self.config.endpoint_url(),
                body,
                compressed,
                token: self.config.token.clone(),
            })
            .await?;

        serde_json::from_slice(&response.body)
            .map_err(|e| ArdenError::Serialization(format!("解析上报响应失败: {}", e)))
    }
}

/// 序列化分块：单条为裸对象，多条为数组
pub fn encode_chunk(chunk: &[TelemetryEvent]) -> Result<(Bytes, bool)> {
    let json = match chunk {
        [single] => serde_json::to_vec(single)?,
        _ => serde_json::to_vec(chunk)?,
    };
    encode_body(json)
}

/// 超过阈值时 gzip 压缩，返回 (body, 是否压缩)
pub fn encode_body(json: Vec<u8>) -> Result<(Bytes, bool)> {
    if json.len() <= COMPRESSION_THRESHOLD {
        return Ok((Bytes::from(json), false));
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    debug!("请求体已压缩: {} -> {} bytes", json.len(), compressed.len());
    Ok((Bytes::from(compressed), true))
}

/// 便捷入口：校验原始候选事件后用新客户端投递
pub async fn send_telemetry(config: DeliveryConfig, candidates: &[Value]) -> Result<DeliveryResult> {
    let events = validate_events(candidates)?;
    DeliveryClient::new(config)?.send_events(&events).await
}
