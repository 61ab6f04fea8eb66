//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "weather_readings_generated_total",
        "Total number of temperature readings generated"
    );
    metrics::describe_counter!(
        "weather_readings_dropped_total",
        "Temperature readings dropped because the publisher was busy"
    );
    metrics::describe_counter!(
        "weather_readings_published_total",
        "Temperature readings handed to the transport"
    );
    metrics::describe_counter!(
        "weather_readings_failed_total",
        "Temperature readings the transport failed to deliver"
    );
    metrics::describe_counter!(
        "station_descriptors_published_total",
        "Weather station descriptors published at startup"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录生成的温度读数
#[inline]
pub fn record_reading_generated(station_id: i32) {
    metrics::counter!(
        "weather_readings_generated_total",
        "station_id" => station_id.to_string()
    )
    .increment(1);
}

/// 记录因缓冲区已满而丢弃的读数
#[inline]
pub fn record_reading_dropped() {
    metrics::counter!("weather_readings_dropped_total").increment(1);
}

/// 记录温度读数的发布结果
#[inline]
pub fn record_reading_published(success: bool) {
    if success {
        metrics::counter!("weather_readings_published_total").increment(1);
    } else {
        metrics::counter!("weather_readings_failed_total").increment(1);
    }
}

/// 记录已发布的气象站描述
#[inline]
pub fn record_station_published() {
    metrics::counter!("station_descriptors_published_total").increment(1);
}
