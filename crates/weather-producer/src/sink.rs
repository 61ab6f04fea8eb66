//! 记录投递端
//!
//! `RecordSink` 是生成器与传输层之间的接缝：连接管理、分区寻址与投递保证
//! 都属于具体实现，发布者只关心“把这条记录交给某个 topic”。

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use weather_shared::error::Result;
use weather_shared::kafka::KafkaProducer;

use crate::reading::Record;

/// 记录投递接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn send(&self, topic: &str, record: &Record) -> Result<()>;
}

/// Kafka 投递端
///
/// 键编码为 4 字节大端整数，值为 UTF-8 文本。
#[derive(Clone)]
pub struct KafkaRecordSink {
    producer: KafkaProducer,
}

impl KafkaRecordSink {
    pub fn new(producer: KafkaProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl RecordSink for KafkaRecordSink {
    async fn send(&self, topic: &str, record: &Record) -> Result<()> {
        self.producer
            .send_keyed_text(topic, record.key, &record.value)
            .await?;
        Ok(())
    }
}

/// 只写日志的投递端，用于 `--dry-run`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl RecordSink for LogSink {
    async fn send(&self, topic: &str, record: &Record) -> Result<()> {
        info!(topic, key = record.key, value = %record.value, "dry-run 记录");
        Ok(())
    }
}

/// 内存投递端，按到达顺序保存 (topic, record)
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, Record)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部记录的快照
    pub fn records(&self) -> Vec<(String, Record)> {
        self.records.lock().clone()
    }

    /// 指定 topic 的记录快照
    pub fn records_for(&self, topic: &str) -> Vec<Record> {
        self.records
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn send(&self, topic: &str, record: &Record) -> Result<()> {
        self.records.lock().push((topic.to_string(), record.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_order_per_topic() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.send("a", &Record::new(1, "x")).await.unwrap();
        sink.send("b", &Record::new(2, "y")).await.unwrap();
        sink.send("a", &Record::new(3, "z")).await.unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.records_for("a"),
            vec![Record::new(1, "x"), Record::new(3, "z")]
        );
        assert_eq!(sink.records()[1], ("b".to_string(), Record::new(2, "y")));
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        assert!(sink.send("temperature-values", &Record::new(1, "v")).await.is_ok());
    }
}
