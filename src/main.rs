//! depthcast - exchange-agnostic order book cache
//!
//! Wires the feed connection, dispatch router, mutation pipeline, relay
//! publisher, and ladder sampler together, plus a health/metrics HTTP
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depthcast::book::OrderBook;
use depthcast::config::Config;
use depthcast::dispatch::{AckHandler, BookFeedHandler, EventRouter, EventTag, TradeLogHandler};
use depthcast::exchange::{BinanceAdapter, ExchangeAdapter};
use depthcast::feed::{derive_topic, normalize_symbol};
use depthcast::metrics::FeedMetrics;
use depthcast::persist::{JsonlSink, Sampler};
use depthcast::pipeline::MutationPipeline;
use depthcast::publisher::SocketPublisher;
use depthcast::websocket::FeedConnection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting depthcast order book cache");

    let config = Arc::new(Config::load()?);
    info!(symbols = ?config.symbols, exchange = %config.exchange_code, "Configuration loaded");

    let metrics = Arc::new(FeedMetrics::new()?);
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(BinanceAdapter::new());

    // One book and one writer per symbol
    let publisher = Arc::new(SocketPublisher::new(&config.relay_socket_path).await?);
    let mut pipeline = MutationPipeline::new(
        publisher,
        metrics.clone(),
        config.depth_levels,
        config.queue_capacity,
    );
    for symbol in &config.symbols {
        let normalized = normalize_symbol(symbol);
        let topic = derive_topic(symbol, &config.exchange_code);
        pipeline.register(OrderBook::new(&normalized, &topic));
    }
    let handle = pipeline.handle();

    // Ladder telemetry sampler
    let topics_by_symbol: std::collections::HashMap<String, String> = config
        .symbols
        .iter()
        .map(|s| (normalize_symbol(s), derive_topic(s, &config.exchange_code)))
        .collect();
    let feeds = pipeline
        .watches()
        .into_iter()
        .map(|(symbol, watch_rx)| {
            let topic = topics_by_symbol
                .get(&symbol)
                .cloned()
                .unwrap_or_else(|| symbol.clone());
            (topic, watch_rx)
        })
        .collect();
    let sampler = Sampler::new(
        Duration::from_secs(config.sample_interval_secs),
        feeds,
        Arc::new(JsonlSink::new(&config.sample_path)),
    );
    tokio::spawn(sampler.run());

    // Health and metrics endpoint
    let http_port = config.http_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(http_port).await {
            warn!(error = %e, "Health server error");
        }
    });

    // Dispatch table for this exchange connection
    let router = EventRouter::new(adapter.code(), metrics.clone())
        .register(EventTag::Snapshot, Box::new(BookFeedHandler::new(handle.clone())))
        .register(EventTag::Diff, Box::new(BookFeedHandler::new(handle.clone())))
        .register(EventTag::Ack, Box::new(AckHandler::new(adapter.code())))
        .register(EventTag::Trade, Box::new(TradeLogHandler));

    let mut connection = FeedConnection::new(config, adapter, router);
    connection.run().await?;

    Ok(())
}

/// HTTP server for health checks and prometheus metrics
async fn start_health_server(port: u16) -> anyhow::Result<()> {
    use std::net::SocketAddr;
    use tower_http::trace::TraceLayer;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "depthcast",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics_text() -> String {
    use prometheus::{Encoder, TextEncoder};
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
