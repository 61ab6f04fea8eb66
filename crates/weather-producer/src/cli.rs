//! 命令行参数
//!
//! 命令行参数优先级最高，会覆盖配置文件与环境变量中的同名配置。
//!
//! ```bash
//! # 连接本地 Kafka，每 500ms 生成一条温度读数
//! weather-producer --kafka-brokers localhost:9092 --interval-ms 500
//!
//! # 不连接 Kafka，只把记录打印到日志
//! weather-producer --dry-run
//! ```

use clap::Parser;
use weather_shared::config::AppConfig;

/// 气象数据生产者
#[derive(Parser, Debug, Default)]
#[command(name = "weather-producer")]
#[command(version, about = "周期性生成模拟气象数据并发布到 Kafka")]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Kafka brokers 地址
    #[arg(long)]
    pub kafka_brokers: Option<String>,

    /// 温度读数生成间隔（毫秒）
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// 生成器与发布者之间的缓冲容量
    #[arg(long)]
    pub buffer: Option<usize>,

    /// 只输出日志，不连接 Kafka
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// 将命令行参数覆盖到配置上
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(brokers) = &self.kafka_brokers {
            config.kafka.brokers = brokers.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.generator.interval_ms = interval_ms;
        }
        if let Some(buffer) = self.buffer {
            config.generator.buffer_capacity = buffer;
        }
    }
}
