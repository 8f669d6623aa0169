use crate::delivery::DeliveryResult;
use crate::schema::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum ArdenError {
    /// 事件结构/格式/大小校验失败（本地错误，不重试）
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// 网络层错误（连接失败、读取响应失败等）
    #[error("Transport error: {0}")]
    Transport(String),
    /// 服务端返回非 2xx
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// 分块投递中途失败；`delivered` 为失败前已投递分块的聚合结果
    #[error("Delivery aborted at chunk {chunk_index}: {source}")]
    DeliveryAborted {
        chunk_index: usize,
        delivered: Box<DeliveryResult>,
        #[source]
        source: Box<ArdenError>,
    },
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Settings error: {0}")]
    Settings(String),
    /// 同步状态读写失败
    #[error("State error: {0}")]
    State(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    IO(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ArdenError {
    fn from(error: serde_json::Error) -> Self {
        ArdenError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for ArdenError {
    fn from(error: std::io::Error) -> Self {
        ArdenError::IO(error.to_string())
    }
}

impl From<reqwest::Error> for ArdenError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ArdenError::Timeout(error.to_string())
        } else {
            ArdenError::Transport(error.to_string())
        }
    }
}

impl ArdenError {
    /// 投递中途失败时，取出失败前已完成的部分结果
    pub fn partial_delivery(&self) -> Option<&DeliveryResult> {
        match self {
            ArdenError::DeliveryAborted { delivered, .. } => Some(delivered),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArdenError>;
