//! 气象站列表
//!
//! 气象站在启动时显式构造并注入生成器，进程生命周期内只读。

use std::collections::HashSet;
use std::sync::Arc;

use weather_shared::error::{Result, WeatherError};

/// 气象站
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherStation {
    /// 唯一 id，同时作为输出记录的分区键
    pub id: i32,
    pub name: String,
    /// 温度分布的均值（摄氏度）
    pub average_temperature: i32,
}

impl WeatherStation {
    pub fn new(id: i32, name: impl Into<String>, average_temperature: i32) -> Self {
        Self {
            id,
            name: name.into(),
            average_temperature,
        }
    }
}

/// 只读的气象站列表
///
/// 内部以 `Arc<[WeatherStation]>` 共享，clone 只增加引用计数，
/// 可在温度流与描述流之间并发读取。
#[derive(Debug, Clone)]
pub struct WeatherStations {
    stations: Arc<[WeatherStation]>,
}

impl WeatherStations {
    /// 构造并校验气象站列表
    ///
    /// 列表不能为空，id 必须为正且唯一，名称不能为空且唯一。
    pub fn new(stations: Vec<WeatherStation>) -> Result<Self> {
        if stations.is_empty() {
            return Err(WeatherError::InvalidStation("气象站列表不能为空".to_string()));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for station in &stations {
            if station.id <= 0 {
                return Err(WeatherError::InvalidStation(format!(
                    "id 必须为正数: {}",
                    station.id
                )));
            }
            if station.name.trim().is_empty() {
                return Err(WeatherError::InvalidStation(format!(
                    "名称不能为空: id={}",
                    station.id
                )));
            }
            if !ids.insert(station.id) {
                return Err(WeatherError::InvalidStation(format!(
                    "重复的 id: {}",
                    station.id
                )));
            }
            if !names.insert(station.name.as_str()) {
                return Err(WeatherError::InvalidStation(format!(
                    "重复的名称: {}",
                    station.name
                )));
            }
        }

        Ok(Self {
            stations: stations.into(),
        })
    }

    /// 参考气象站列表（9 个）
    pub fn reference() -> Self {
        let stations: Vec<WeatherStation> = [
            (1, "Hamburg", 13),
            (2, "Snowdonia", 5),
            (3, "Boston", 11),
            (4, "Tokio", 16),
            (5, "Cusco", 12),
            (6, "Svalbard", -7),
            (7, "Porthsmouth", 11),
            (8, "Oslo", 7),
            (9, "Marrakesh", 20),
        ]
        .into_iter()
        .map(|(id, name, avg)| WeatherStation::new(id, name, avg))
        .collect();

        Self {
            stations: stations.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// 构造时已保证非空，恒为 false
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WeatherStation> {
        self.stations.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeatherStation> {
        self.stations.iter()
    }

    #[cfg(test)]
    pub fn find(&self, id: i32) -> Option<&WeatherStation> {
        self.stations.iter().find(|s| s.id == id)
    }

    #[cfg(test)]
    pub fn contains_id(&self, id: i32) -> bool {
        self.find(id).is_some()
    }
}

impl<'a> IntoIterator for &'a WeatherStations {
    type Item = &'a WeatherStation;
    type IntoIter = std::slice::Iter<'a, WeatherStation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
