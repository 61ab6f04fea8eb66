//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, WeatherError};
use crate::observability::ObservabilityConfig;

/// Kafka 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    /// 单条消息的投递超时，超时后由 rdkafka 报告发送失败
    pub message_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            message_timeout_ms: 5000,
        }
    }
}

/// 输出 topic 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub temperature_values: String,
    pub weather_stations: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            temperature_values: crate::kafka::topics::TEMPERATURE_VALUES.to_string(),
            weather_stations: crate::kafka::topics::WEATHER_STATIONS.to_string(),
        }
    }
}

/// 定时器间隔上限：一天
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// 温度生成器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 定时器间隔（毫秒）
    pub interval_ms: u64,
    /// 温度分布的标准差（摄氏度）
    pub temperature_stddev: f64,
    /// 生成器与发布者之间的缓冲容量，满时丢弃最新读数
    pub buffer_capacity: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            temperature_stddev: 15.0,
            buffer_capacity: 1,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub kafka: KafkaConfig,
    pub topics: TopicConfig,
    pub generator: GeneratorConfig,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "weather-producer".to_string(),
            environment: "development".to_string(),
            kafka: KafkaConfig::default(),
            topics: TopicConfig::default(),
            generator: GeneratorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（WEATHER_ 前缀，`__` 表示层级，如 WEATHER_KAFKA__BROKERS -> kafka.brokers）
    pub fn load(service_name: &str) -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("WEATHER_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    pub fn load_from(
        config_dir: &Path,
        env: &str,
        service_name: &str,
    ) -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 字段名本身含下划线，层级分隔符使用双下划线
            .add_source(
                Environment::with_prefix("WEATHER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 校验配置的取值范围
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.trim().is_empty() {
            return Err(invalid("kafka.brokers", "不能为空"));
        }
        if self.topics.temperature_values.is_empty() || self.topics.weather_stations.is_empty() {
            return Err(invalid("topics", "topic 名称不能为空"));
        }
        if self.generator.interval_ms == 0 || self.generator.interval_ms > MAX_INTERVAL_MS {
            return Err(invalid(
                "generator.interval_ms",
                &format!("必须在 1..={MAX_INTERVAL_MS} 之间"),
            ));
        }
        if self.generator.buffer_capacity == 0 {
            return Err(invalid("generator.buffer_capacity", "必须大于 0"));
        }
        let stddev = self.generator.temperature_stddev;
        if !stddev.is_finite() || stddev < 0.0 {
            return Err(invalid(
                "generator.temperature_stddev",
                &format!("必须为非负有限数，实际为 {stddev}"),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> WeatherError {
    WeatherError::InvalidConfig {
        field: field.to_string(),
        message: message.to_string(),
    }
}
