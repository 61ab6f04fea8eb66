//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer 抽象，
//! 统一消息键编码与错误映射，投递重试交由 rdkafka 自身处理。

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::error::WeatherError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 默认 topic 名称，可通过 `topics` 配置段覆盖
pub mod topics {
    pub const TEMPERATURE_VALUES: &str = "temperature-values";
    pub const WEATHER_STATIONS: &str = "weather-stations";
}

/// 将整数消息键编码为 4 字节大端序
///
/// 与 Kafka 客户端标准的 IntegerSerializer 保持一致，
/// 下游使用 IntegerDeserializer 即可还原气象站 id。
pub fn encode_int_key(key: i32) -> [u8; 4] {
    key.to_be_bytes()
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer`，内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `message.timeout.ms` 限定单条消息的最长投递时间，超时即视为发送失败，
    /// 不在本层做额外重试。
    pub fn new(config: &KafkaConfig) -> Result<Self, WeatherError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| WeatherError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
    ) -> Result<(i32, i64), WeatherError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        // rdkafka 0.39+ 返回 Delivery 结构体而非元组
        let delivery = self
            .producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(e, _)| WeatherError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 以整数为键发送 UTF-8 文本消息
    pub async fn send_keyed_text(
        &self,
        topic: &str,
        key: i32,
        value: &str,
    ) -> Result<(i32, i64), WeatherError> {
        self.send(topic, &encode_int_key(key), value.as_bytes())
            .await
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
