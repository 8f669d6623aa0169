//! 事件投递模块
//!
//! - `config`：投递配置（host、token、超时、重试预算）
//! - `retry_policy`：单请求重试策略
//! - `transport`：HTTP 传输抽象及 reqwest 实现
//! - `result`：分块响应与聚合结果
//! - `client`：分块、串行投递与聚合

pub mod client;
pub mod config;
pub mod result;
pub mod retry_policy;
pub mod transport;

pub use client::{encode_body, encode_chunk, send_telemetry, DeliveryClient, CHUNK_SIZE, COMPRESSION_THRESHOLD};
pub use config::{DeliveryConfig, DeliveryConfigBuilder, DEFAULT_ENDPOINT_PATH, DEFAULT_HOST};
pub use result::{ChunkResponse, DeliveryResult, DeliveryStatus, RejectedEvent};
pub use retry_policy::{FailureReason, RetryPolicy};
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
