//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum WeatherError {
    // ==================== Kafka 错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("无效的配置项: {field} - {message}")]
    InvalidConfig { field: String, message: String },

    // ==================== 数据错误 ====================
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("无效的气象站: {0}")]
    InvalidStation(String),

    #[error("无效的温度读数: {0}")]
    InvalidReading(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, WeatherError>;

impl WeatherError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::InvalidStation(_) => "INVALID_STATION",
            Self::InvalidReading(_) => "INVALID_READING",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有传输层错误值得由调用方重试，数据与配置错误重试也不会成功。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Kafka(_))
    }
}
