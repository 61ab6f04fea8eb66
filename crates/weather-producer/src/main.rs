//! 气象数据生产者
//!
//! 启动时发布气象站描述，随后按固定间隔发布模拟温度读数，直到收到关闭信号。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use weather_producer::SERVICE_NAME;
use weather_producer::cli::Cli;
use weather_producer::generator::Generator;
use weather_producer::publisher::Publisher;
use weather_producer::sink::{KafkaRecordSink, LogSink, RecordSink};
use weather_producer::station::WeatherStations;
use weather_shared::config::AppConfig;
use weather_shared::kafka::KafkaProducer;
use weather_shared::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    cli.apply(&mut config);
    config.validate()?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        brokers = %config.kafka.brokers,
        dry_run = cli.dry_run,
        "Starting weather-producer..."
    );

    let sink: Arc<dyn RecordSink> = if cli.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(KafkaRecordSink::new(KafkaProducer::new(&config.kafka)?))
    };
    let publisher = Publisher::new(sink, config.topics.clone());

    let generator = Generator::from_os_rng(
        WeatherStations::reference(),
        config.generator.temperature_stddev,
    )?;

    // 气象站描述缺失时下游无法关联读数，视为启动失败
    let station_records = generator.station_records()?;
    publisher
        .publish_stations(station_records)
        .await
        .context("发布气象站描述失败")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (rx, mut generator_handle) = generator.spawn_temperature_stream(
        Duration::from_millis(config.generator.interval_ms),
        config.generator.buffer_capacity,
        shutdown_rx.clone(),
    );
    let publisher_handle =
        tokio::spawn(async move { publisher.publish_temperatures(rx, shutdown_rx).await });

    let stream_result = tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            generator_handle.await?
        }
        result = &mut generator_handle => result?,
    };
    let _ = shutdown_tx.send(true);

    let published = publisher_handle.await?;

    match stream_result {
        Ok(stats) => {
            info!(
                emitted = stats.emitted,
                dropped = stats.dropped,
                published,
                "weather-producer stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, published, "温度流异常终止");
            Err(e.into())
        }
    }
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
