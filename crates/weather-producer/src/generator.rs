//! 气象数据生成器
//!
//! 产生两条相互独立的输出序列：
//!
//! 1. 温度流：定时器每个 tick 随机选择一个气象站，按
//!    `N(0, 1) * stddev + 平均温度` 生成温度并 HALF_UP 舍入到一位小数。
//!    无限序列，发布者跟不上时丢弃最新的读数，定时器永不阻塞。
//! 2. 气象站描述流：启动时按列表顺序为每个气象站产生一条描述，产生 N 条后结束。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use weather_shared::config::MAX_INTERVAL_MS;
use weather_shared::error::{Result, WeatherError};
use weather_shared::observability::metrics;

use crate::reading::{Record, StationDescriptor, Temperature, TemperatureReading};
use crate::station::WeatherStations;

/// 时间来源，默认为系统墙上时钟
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 温度流结束时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// 成功交给发布者的读数
    pub emitted: u64,
    /// 因缓冲区已满而丢弃的读数
    pub dropped: u64,
}

/// 气象数据生成器
///
/// 气象站列表与随机源均由调用方注入，生成器本身不持有任何全局状态。
pub struct Generator<R = StdRng> {
    stations: WeatherStations,
    rng: R,
    stddev: f64,
    clock: Clock,
}

impl Generator<StdRng> {
    /// 使用操作系统熵源初始化随机数生成器
    pub fn from_os_rng(stations: WeatherStations, stddev: f64) -> Result<Self> {
        Self::new(stations, StdRng::from_os_rng(), stddev)
    }
}

impl<R: Rng> Generator<R> {
    /// 创建生成器
    ///
    /// `stddev` 必须为非负有限数。
    pub fn new(stations: WeatherStations, rng: R, stddev: f64) -> Result<Self> {
        if !stddev.is_finite() || stddev < 0.0 {
            return Err(WeatherError::InvalidConfig {
                field: "generator.temperature_stddev".to_string(),
                message: format!("必须为非负有限数，实际为 {stddev}"),
            });
        }

        Ok(Self {
            stations,
            rng,
            stddev,
            clock: Arc::new(Utc::now),
        })
    }

    /// 替换时间来源（测试中用于产生确定的时间戳）
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn stations(&self) -> &WeatherStations {
        &self.stations
    }

    /// 生成一条温度记录
    ///
    /// 均匀随机选择气象站，采样并舍入温度，以当前时刻组装读数。
    pub fn next_record(&mut self) -> Result<Record> {
        let index = self.rng.random_range(0..self.stations.len());
        let Some(station) = self.stations.get(index) else {
            return Err(WeatherError::Internal(format!("气象站下标越界: {index}")));
        };

        let raw = sample_temperature(&mut self.rng, station.average_temperature, self.stddev);
        let temperature = Temperature::round_half_up(raw)?;
        let reading = TemperatureReading::new((self.clock)(), temperature);

        info!(station = %station.name, temperature = %temperature, "温度读数已生成");
        metrics::record_reading_generated(station.id);

        Ok(reading.into_record(station.id))
    }

    /// 气象站描述序列（按列表顺序，每站一条）
    pub fn station_descriptors(&self) -> impl Iterator<Item = StationDescriptor> + '_ {
        self.stations.iter().map(StationDescriptor::from)
    }

    /// 气象站描述记录，序列化失败时整体失败
    pub fn station_records(&self) -> Result<Vec<Record>> {
        self.station_descriptors()
            .map(StationDescriptor::into_record)
            .collect()
    }
}

/// 从正态分布 N(average, stddev²) 中采样原始温度
pub fn sample_temperature<R: Rng>(
    rng: &mut R,
    average_temperature: i32,
    stddev: f64,
) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    z * stddev + f64::from(average_temperature)
}

impl<R: Rng + Send + 'static> Generator<R> {
    /// 在后台任务中运行温度流
    ///
    /// 返回接收端与任务句柄。接收端被 drop 或 `shutdown` 变为 `true` 时温度流结束。
    pub fn spawn_temperature_stream(
        self,
        interval: Duration,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<Record>, JoinHandle<Result<TickStats>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run_temperature_stream(interval, tx, shutdown));
        (rx, handle)
    }

    /// 温度流主循环
    ///
    /// 每个 tick 生成一条记录并以 `try_send` 交给发布者：
    /// - 缓冲区已满：丢弃这条最新读数，不阻塞定时器
    /// - 接收端已关闭：订阅方取消，循环结束
    ///
    /// 间隔为 0 或超出上限时不启动定时器，直接返回 `InvalidConfig`。
    /// 生成失败对该流是致命的，记录日志后返回错误。
    pub async fn run_temperature_stream(
        mut self,
        interval: Duration,
        tx: mpsc::Sender<Record>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<TickStats> {
        let first_tick = first_tick_at(interval)?;

        let mut stats = TickStats::default();
        // changed() 只感知新版本，启动前已发出的关闭信号需要单独检查
        if *shutdown.borrow_and_update() {
            info!("启动前已收到关闭信号，温度流不启动");
            return Ok(stats);
        }

        let mut ticker = tokio::time::interval_at(first_tick, interval);
        // 定时器落后时不补发积压的 tick
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval = ?interval,
            stations = self.stations.len(),
            stddev = self.stddev,
            "温度流已启动"
        );

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(?stats, "收到关闭信号，温度流退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let record = match self.next_record() {
                        Ok(record) => record,
                        Err(e) => {
                            error!(error = %e, code = e.code(), "生成温度读数失败，温度流终止");
                            return Err(e);
                        }
                    };

                    match tx.try_send(record) {
                        Ok(()) => stats.emitted += 1,
                        Err(mpsc::error::TrySendError::Full(dropped)) => {
                            stats.dropped += 1;
                            metrics::record_reading_dropped();
                            debug!(station_id = dropped.key, "发布者繁忙，丢弃最新读数");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            info!(?stats, "订阅方已取消，温度流结束");
                            break;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }
}

/// 校验定时器间隔并计算首个 tick 的时刻
fn first_tick_at(interval: Duration) -> Result<Instant> {
    let out_of_range = || WeatherError::InvalidConfig {
        field: "generator.interval_ms".to_string(),
        message: format!("必须在 1..={MAX_INTERVAL_MS} 毫秒之间，实际为 {interval:?}"),
    };

    if interval.is_zero() || interval > Duration::from_millis(MAX_INTERVAL_MS) {
        return Err(out_of_range());
    }
    Instant::now().checked_add(interval).ok_or_else(out_of_range)
}
