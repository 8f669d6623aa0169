use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ArdenError;

/// 请求失败原因分类
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FailureReason {
    /// 请求超时 - 可重试
    Timeout,
    /// 连接失败 - 可重试
    ConnectionFailed,
    /// 服务端错误 - 5xx 可重试
    ServerError(u16),
    /// 限流 (429) - 延迟重试
    RateLimited,
    /// 客户端错误 (4xx) - 不重试
    ClientError(u16),
    /// 未知错误
    Unknown(String),
}

impl FailureReason {
    /// 根据 HTTP 状态码分类
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureReason::RateLimited,
            500..=599 => FailureReason::ServerError(status),
            _ => FailureReason::ClientError(status),
        }
    }

    /// 判断是否可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::Timeout => true,
            FailureReason::ConnectionFailed => true,
            FailureReason::ServerError(_) => true,
            FailureReason::RateLimited => true,
            FailureReason::ClientError(_) => false,
            FailureReason::Unknown(_) => false,
        }
    }

    /// 获取重试延迟倍数
    pub fn delay_multiplier(&self) -> f64 {
        match self {
            FailureReason::ServerError(_) => 1.5,
            FailureReason::RateLimited => 3.0, // 限流需要更长延迟
            _ => 1.0,
        }
    }
}

impl From<&ArdenError> for FailureReason {
    fn from(error: &ArdenError) -> Self {
        match error {
            ArdenError::Timeout(_) => FailureReason::Timeout,
            ArdenError::Transport(_) => FailureReason::ConnectionFailed,
            ArdenError::HttpStatus { status, .. } => FailureReason::from_status(*status),
            other => FailureReason::Unknown(other.to_string()),
        }
    }
}

/// 单请求重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避因子
    pub backoff_factor: f64,
    /// 随机抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            ..Default::default()
        }
    }

    /// 检查是否应该重试（retry_count 为已重试次数）
    pub fn should_retry(&self, retry_count: u32, reason: &FailureReason) -> bool {
        retry_count < self.max_retries && reason.is_retryable()
    }

    /// 计算下次重试前的等待时间；不应重试时返回 None
    pub fn next_delay(&self, retry_count: u32, reason: &FailureReason) -> Option<Duration> {
        if !self.should_retry(retry_count, reason) {
            return None;
        }

        // 基础延迟 = base_delay * (backoff_factor ^ retry_count)
        let base_delay = self.base_delay_ms as f64 * self.backoff_factor.powf(retry_count as f64);
        let adjusted = base_delay * reason.delay_multiplier();
        let capped = adjusted.min(self.max_delay_ms as f64);

        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5);
        let final_delay = (capped + jitter).max(0.0);

        Some(Duration::from_millis(final_delay as u64))
    }
}
