//! 输出记录格式
//!
//! - 温度读数：`"<ISO-8601 时间>;<一位小数的温度>"`
//! - 气象站描述：`{"id":<int>,"name":"<string>"}`
//!
//! 两类记录都以气象站 id 作为键。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use weather_shared::error::{Result, WeatherError};

use crate::station::WeatherStation;

/// 输出流上的一条键值记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 气象站 id
    pub key: i32,
    pub value: String,
}

impl Record {
    pub fn new(key: i32, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

/// 保留一位小数的温度，内部以 0.1°C 为单位的整数存储
///
/// 整数存储保证格式化结果恰好一位小数，且不会出现 `-0.0`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature {
    tenths: i64,
}

impl Temperature {
    pub fn from_tenths(tenths: i64) -> Self {
        Self { tenths }
    }

    /// 将原始采样值四舍五入（HALF_UP）到一位小数
    pub fn round_half_up(value: f64) -> Result<Self> {
        round_half_up_tenths(value).map(Self::from_tenths)
    }

    pub fn tenths(&self) -> i64 {
        self.tenths
    }

    #[cfg(test)]
    pub fn as_f64(&self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 { "-" } else { "" };
        let abs = self.tenths.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

impl FromStr for Temperature {
    type Err = WeatherError;

    /// 只接受恰好一位小数的十进制数，如 `12.5`、`-7.0`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WeatherError::InvalidReading(format!("温度必须恰好一位小数: {s:?}"));

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = digits.split_once('.').ok_or_else(invalid)?;

        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || frac_part.len() != 1 || !all_digits(frac_part) {
            return Err(invalid());
        }

        let whole: i64 = int_part.parse().map_err(|_| invalid())?;
        let frac = i64::from(frac_part.as_bytes()[0] - b'0');
        let tenths = whole
            .checked_mul(10)
            .and_then(|t| t.checked_add(frac))
            .ok_or_else(invalid)?;

        Ok(Self::from_tenths(if negative { -tenths } else { tenths }))
    }
}

/// HALF_UP 舍入到 0.1
///
/// 在采样值的最短十进制表示上舍入（Rust 的 `f64` Display 输出可往返的最短数字串，
/// 且不使用科学计数法），因此 `12.45` 得到 `12.5` 而不受二进制误差影响。
/// 舍入方向远离零：`-12.45` 得到 `-12.5`。
pub fn round_half_up_tenths(value: f64) -> Result<i64> {
    if !value.is_finite() {
        return Err(WeatherError::InvalidReading(format!(
            "温度采样值不是有限数: {value}"
        )));
    }

    let repr = value.to_string();
    let (negative, digits) = match repr.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, repr.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let overflow = || WeatherError::InvalidReading(format!("温度超出范围: {value}"));
    let whole: i64 = int_part.parse().map_err(|_| overflow())?;

    let mut frac = frac_part.bytes().map(|b| i64::from(b - b'0'));
    let first = frac.next().unwrap_or(0);
    let round_up = frac.next().is_some_and(|d| d >= 5);

    let magnitude = whole
        .checked_mul(10)
        .and_then(|t| t.checked_add(first + i64::from(round_up)))
        .ok_or_else(overflow)?;

    Ok(if negative { -magnitude } else { magnitude })
}

// ---------------------------------------------------------------------------
// TemperatureReading
// ---------------------------------------------------------------------------

/// 单次 tick 产生的温度读数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureReading {
    pub timestamp: DateTime<Utc>,
    pub temperature: Temperature,
}

impl TemperatureReading {
    pub fn new(timestamp: DateTime<Utc>, temperature: Temperature) -> Self {
        Self {
            timestamp,
            temperature,
        }
    }

    /// 以气象站 id 为键转换为输出记录
    pub fn into_record(self, station_id: i32) -> Record {
        Record::new(station_id, self.to_string())
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.temperature
        )
    }
}

impl FromStr for TemperatureReading {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(';').collect();
        let [timestamp, temperature] = parts.as_slice() else {
            return Err(WeatherError::InvalidReading(format!(
                "读数必须由 ';' 分隔为两部分: {s:?}"
            )));
        };

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| WeatherError::InvalidReading(format!("无效的时间戳 {timestamp:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(Self::new(timestamp, temperature.parse()?))
    }
}

// ---------------------------------------------------------------------------
// StationDescriptor
// ---------------------------------------------------------------------------

/// 气象站描述，启动时每个气象站发布一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationDescriptor {
    pub id: i32,
    pub name: String,
}

impl StationDescriptor {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_record(self) -> Result<Record> {
        let value = self.to_json()?;
        Ok(Record::new(self.id, value))
    }
}

impl From<&WeatherStation> for StationDescriptor {
    fn from(station: &WeatherStation) -> Self {
        Self {
            id: station.id,
            name: station.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_half_up_law() {
        assert_eq!(Temperature::round_half_up(12.449999).unwrap().to_string(), "12.4");
        assert_eq!(Temperature::round_half_up(12.45).unwrap().to_string(), "12.5");
    }

    #[test]
    fn test_round_half_up_is_not_bankers() {
        // 银行家舍入会得到 0.2 与 0.4
        assert_eq!(round_half_up_tenths(0.25).unwrap(), 3);
        assert_eq!(round_half_up_tenths(0.35).unwrap(), 4);
        assert_eq!(round_half_up_tenths(0.05).unwrap(), 1);
    }

    #[test]
    fn test_round_half_up_negative_values() {
        assert_eq!(round_half_up_tenths(-12.45).unwrap(), -125);
        assert_eq!(round_half_up_tenths(-12.44).unwrap(), -124);
        assert_eq!(round_half_up_tenths(-7.0).unwrap(), -70);
    }

    #[test]
    fn test_round_half_up_no_negative_zero() {
        let t = Temperature::round_half_up(-0.04).unwrap();
        assert_eq!(t.tenths(), 0);
        assert_eq!(t.to_string(), "0.0");
    }

    #[test]
    fn test_round_half_up_integers_and_carry() {
        assert_eq!(Temperature::round_half_up(20.0).unwrap().to_string(), "20.0");
        assert_eq!(Temperature::round_half_up(9.96).unwrap().to_string(), "10.0");
        assert_eq!(Temperature::round_half_up(-0.96).unwrap().to_string(), "-1.0");
    }

    #[test]
    fn test_round_half_up_rejects_non_finite() {
        assert!(round_half_up_tenths(f64::NAN).is_err());
        assert!(round_half_up_tenths(f64::INFINITY).is_err());
        assert!(round_half_up_tenths(1e300).is_err());
    }

    #[test]
    fn test_temperature_display_and_parse() {
        assert_eq!(Temperature::from_tenths(-5).to_string(), "-0.5");
        assert_eq!(Temperature::from_tenths(123).to_string(), "12.3");

        assert_eq!("12.3".parse::<Temperature>().unwrap().tenths(), 123);
        assert_eq!("-0.5".parse::<Temperature>().unwrap().tenths(), -5);
        assert_eq!("-7.0".parse::<Temperature>().unwrap().as_f64(), -7.0);
    }

    #[test]
    fn test_temperature_parse_requires_one_fraction_digit() {
        for bad in ["12", "12.", "12.34", ".5", "-", "1a.0", "12.5e1", "+1.0", ""] {
            assert!(bad.parse::<Temperature>().is_err(), "应拒绝 {bad:?}");
        }
    }

    #[test]
    fn test_reading_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let reading = TemperatureReading::new(ts, Temperature::from_tenths(125));
        assert_eq!(reading.to_string(), "2024-03-01T12:30:00Z;12.5");

        let ts = ts + chrono::Duration::milliseconds(250);
        let reading = TemperatureReading::new(ts, Temperature::from_tenths(-70));
        assert_eq!(reading.to_string(), "2024-03-01T12:30:00.250Z;-7.0");
    }

    #[test]
    fn test_reading_parse() {
        let reading: TemperatureReading = "2024-03-01T12:30:00.123456Z;13.7".parse().unwrap();
        assert_eq!(reading.temperature.tenths(), 137);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
                + chrono::Duration::microseconds(123456)
        );
    }

    #[test]
    fn test_reading_parse_errors() {
        assert!("2024-03-01T12:30:00Z".parse::<TemperatureReading>().is_err());
        assert!("2024-03-01T12:30:00Z;1.0;2.0".parse::<TemperatureReading>().is_err());
        assert!("yesterday;1.0".parse::<TemperatureReading>().is_err());
        assert!("2024-03-01T12:30:00Z;1.25".parse::<TemperatureReading>().is_err());
    }

    #[test]
    fn test_reading_into_record() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let record = TemperatureReading::new(ts, Temperature::from_tenths(0)).into_record(4);
        assert_eq!(record, Record::new(4, "2024-03-01T00:00:00Z;0.0"));
    }

    #[test]
    fn test_station_descriptor_json() {
        let station = WeatherStation::new(1, "Hamburg", 13);
        let record = StationDescriptor::from(&station).into_record().unwrap();

        assert_eq!(record.key, 1);
        assert_eq!(record.value, r#"{"id":1,"name":"Hamburg"}"#);

        let parsed: StationDescriptor = serde_json::from_str(&record.value).unwrap();
        assert_eq!(parsed.name, "Hamburg");
    }

    #[test]
    fn test_station_descriptor_escapes_name() {
        let descriptor = StationDescriptor {
            id: 2,
            name: "Snow \"donia\"".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&descriptor.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "Snow \"donia\"");
        assert_eq!(json["id"], 2);
    }
}
