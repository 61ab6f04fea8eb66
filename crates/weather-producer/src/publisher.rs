//! 记录发布者
//!
//! 将生成器产生的两条序列投递到各自的 topic：
//! - 气象站描述在启动时一次性发布，任何一条失败都视为启动失败
//! - 温度读数持续从缓冲通道取出发布，单条失败只记录日志，重试由传输层负责

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};
use weather_shared::config::TopicConfig;
use weather_shared::error::Result;
use weather_shared::observability::metrics;

use crate::reading::Record;
use crate::sink::RecordSink;

/// 记录发布者
pub struct Publisher<S: ?Sized> {
    sink: Arc<S>,
    topics: TopicConfig,
}

impl<S: RecordSink + ?Sized> Publisher<S> {
    pub fn new(sink: Arc<S>, topics: TopicConfig) -> Self {
        Self { sink, topics }
    }

    /// 按顺序发布全部气象站描述，返回发布条数
    pub async fn publish_stations(&self, records: Vec<Record>) -> Result<usize> {
        let topic = self.topics.weather_stations.as_str();

        for record in &records {
            if let Err(e) = self.sink.send(topic, record).await {
                error!(
                    topic,
                    station_id = record.key,
                    error = %e,
                    "发布气象站描述失败"
                );
                return Err(e);
            }
            metrics::record_station_published();
            debug!(topic, station_id = record.key, "气象站描述已发布");
        }

        info!(topic, count = records.len(), "气象站描述发布完成");
        Ok(records.len())
    }

    /// 持续发布温度读数，直到通道关闭或收到关闭信号，返回成功发布条数
    ///
    /// 退出时 drop 接收端，生成器随之感知订阅取消。
    pub async fn publish_temperatures(
        &self,
        mut rx: mpsc::Receiver<Record>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        let topic = self.topics.temperature_values.as_str();
        let mut published = 0u64;

        // changed() 只感知新版本，启动前已发出的关闭信号需要单独检查
        if *shutdown.borrow_and_update() {
            info!(topic, "启动前已收到关闭信号，温度发布循环不启动");
            return published;
        }

        info!(topic, "温度发布循环已启动");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(published, "收到关闭信号，温度发布循环退出");
                        break;
                    }
                }

                record = rx.recv() => {
                    let Some(record) = record else {
                        info!(published, "温度流已结束，发布循环退出");
                        break;
                    };

                    match self.sink.send(topic, &record).await {
                        Ok(()) => {
                            published += 1;
                            metrics::record_reading_published(true);
                        }
                        Err(e) => {
                            metrics::record_reading_published(false);
                            error!(
                                topic,
                                station_id = record.key,
                                error = %e,
                                retryable = e.is_retryable(),
                                "发布温度读数失败"
                            );
                        }
                    }
                }
            }
        }

        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, MockRecordSink};
    use weather_shared::error::WeatherError;

    fn topics() -> TopicConfig {
        TopicConfig::default()
    }

    #[tokio::test]
    async fn test_publish_stations_in_order() {
        let sink = Arc::new(MemorySink::new());
        let publisher = Publisher::new(sink.clone(), topics());

        let records = vec![Record::new(1, "a"), Record::new(2, "b"), Record::new(3, "c")];
        let count = publisher.publish_stations(records.clone()).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(sink.records_for("weather-stations"), records);
        assert!(sink.records_for("temperature-values").is_empty());
    }

    #[tokio::test]
    async fn test_publish_stations_aborts_on_first_failure() {
        let mut mock = MockRecordSink::new();
        mock.expect_send()
            .withf(|topic, record| topic == "weather-stations" && record.key == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_send()
            .withf(|_, record| record.key == 2)
            .times(1)
            .returning(|_, _| Err(WeatherError::Kafka("broker 不可达".to_string())));

        let publisher = Publisher::new(Arc::new(mock), topics());
        let records = vec![Record::new(1, "a"), Record::new(2, "b"), Record::new(3, "c")];

        let err = publisher.publish_stations(records).await.unwrap_err();
        assert_eq!(err.code(), "KAFKA_ERROR");
    }

    #[tokio::test]
    async fn test_publish_temperatures_until_channel_closes() {
        let sink = Arc::new(MemorySink::new());
        let publisher = Publisher::new(sink.clone(), topics());
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(Record::new(1, "first")).await.unwrap();
        tx.send(Record::new(2, "second")).await.unwrap();
        drop(tx);

        let published = publisher.publish_temperatures(rx, shutdown_rx).await;
        assert_eq!(published, 2);
        assert_eq!(
            sink.records_for("temperature-values"),
            vec![Record::new(1, "first"), Record::new(2, "second")]
        );
    }

    #[tokio::test]
    async fn test_publish_temperatures_continues_after_send_failure() {
        let mut mock = MockRecordSink::new();
        mock.expect_send()
            .withf(|_, record| record.key == 1)
            .returning(|_, _| Err(WeatherError::Kafka("超时".to_string())));
        mock.expect_send()
            .withf(|_, record| record.key == 2)
            .returning(|_, _| Ok(()));

        let publisher = Publisher::new(Arc::new(mock), topics());
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(Record::new(1, "lost")).await.unwrap();
        tx.send(Record::new(2, "kept")).await.unwrap();
        drop(tx);

        assert_eq!(publisher.publish_temperatures(rx, shutdown_rx).await, 1);
    }

    #[tokio::test]
    async fn test_publish_temperatures_stops_on_shutdown() {
        let sink = Arc::new(MemorySink::new());
        let publisher = Publisher::new(sink.clone(), topics());
        let (tx, rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        shutdown_tx.send(true).unwrap();
        let published = publisher.publish_temperatures(rx, shutdown_rx).await;

        assert_eq!(published, 0);
        // 发布循环退出后接收端已释放
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_publish_temperatures_honors_shutdown_set_before_start() {
        let sink = Arc::new(MemorySink::new());
        let publisher = Publisher::new(sink.clone(), topics());
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(true);

        // 发送端仍存活且通道中有待发布记录，关闭信号依然生效
        tx.send(Record::new(1, "pending")).await.unwrap();
        let published = publisher.publish_temperatures(rx, shutdown_rx).await;

        assert_eq!(published, 0);
        assert!(sink.is_empty());
        assert!(tx.is_closed());
    }
}
