//! HTTP 传输层 - 用于事件上报
//!
//! 投递客户端只依赖 `HttpTransport` trait；默认实现基于 reqwest，
//! 负责单次请求超时与重试（指数退避），对上层是黑盒。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, warn};

use crate::delivery::config::DeliveryConfig;
use crate::delivery::retry_policy::{FailureReason, RetryPolicy};
use crate::error::{ArdenError, Result};
use crate::version::user_agent;

/// 一次 POST 请求
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub body: Bytes,
    /// body 是否为 gzip 压缩后的字节流
    pub compressed: bool,
    pub token: Option<String>,
}

/// 2xx 响应
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// 可重试的 POST 传输抽象
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 发送请求；非 2xx 响应以 `ArdenError::HttpStatus` 返回
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// 基于 reqwest 的传输实现
pub struct ReqwestTransport {
    client: Client,
    retry_policy: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(user_agent())
            .build()
            .map_err(|e| ArdenError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            retry_policy: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn send_once(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if request.compressed {
            builder = builder.header(CONTENT_ENCODING, "gzip");
        }
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.body(request.body.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ArdenError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut retry_count = 0u32;
        loop {
            match self.send_once(&request).await {
                Ok(response) => {
                    debug!("上报请求成功: url={}, status={}", request.url, response.status);
                    return Ok(response);
                }
                Err(e) => {
                    let reason = FailureReason::from(&e);
                    match self.retry_policy.next_delay(retry_count, &reason) {
                        Some(delay) => {
                            retry_count += 1;
                            warn!(
                                "⚠️ 上报请求失败，{:?} 后第 {} 次重试: {}",
                                delay, retry_count, e
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }
}
