//! Weather Producer
//!
//! 周期性生成模拟气象数据并发布到两个输出流：
//!
//! - `temperature-values`：每个 tick 随机选取一个气象站，按正态分布生成温度读数
//! - `weather-stations`：启动时为每个气象站发布一条描述信息
//!
//! # 主要模块
//!
//! - `station`: 固定的气象站列表
//! - `reading`: 温度读数、气象站描述与输出记录的格式
//! - `generator`: 温度流与气象站描述流的生成器
//! - `sink` / `publisher`: 记录投递到传输层
//!
//! # 使用示例
//!
//! ```rust
//! use weather_producer::generator::Generator;
//! use weather_producer::station::WeatherStations;
//!
//! let generator = Generator::from_os_rng(WeatherStations::reference(), 15.0).unwrap();
//! let records = generator.station_records().unwrap();
//! assert_eq!(records.len(), 9);
//! ```

pub mod cli;
pub mod generator;
pub mod publisher;
pub mod reading;
pub mod sink;
pub mod station;

/// 服务名，用于加载 config/{service_name}.toml 与标识指标来源
pub const SERVICE_NAME: &str = "weather-producer";
