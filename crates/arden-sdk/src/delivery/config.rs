use serde::{Deserialize, Serialize};

use crate::error::{ArdenError, Result};

/// 默认上报服务地址
pub const DEFAULT_HOST: &str = "https://ardenstats.com";
/// 默认事件接收路径
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/events";

/// 投递客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// 服务基础 URL
    pub host: String,
    /// Bearer token（可选）
    pub token: Option<String>,
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
    /// 单次请求的最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），按指数退避放大
    pub retry_base_delay_ms: u64,
    /// 事件接收路径
    pub endpoint_path: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            token: None,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 500,
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
        }
    }
}

impl DeliveryConfig {
    pub fn builder() -> DeliveryConfigBuilder {
        DeliveryConfigBuilder::new()
    }

    /// 完整的事件接收 URL
    pub fn endpoint_url(&self) -> String {
        let base = self.host.trim_end_matches('/');
        if self.endpoint_path.starts_with('/') {
            format!("{}{}", base, self.endpoint_path)
        } else {
            format!("{}/{}", base, self.endpoint_path)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(ArdenError::Config(format!(
                "host must be an http(s) URL: {}",
                self.host
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ArdenError::Config("timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DeliveryConfigBuilder {
    config: DeliveryConfig,
}

impl DeliveryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
        }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn token<S: Into<String>>(mut self, token: Option<S>) -> Self {
        self.config.token = token.map(Into::into);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.retry_base_delay_ms = delay_ms;
        self
    }

    pub fn endpoint_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn build(self) -> DeliveryConfig {
        self.config
    }
}
