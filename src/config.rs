//! Configuration for the order book cache

use serde::Deserialize;
use std::env;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Venue symbols to subscribe to (e.g. ["BTCUSDT", "ETHUSDT"])
    pub symbols: Vec<String>,

    /// Exchange code used in downstream topics
    pub exchange_code: String,

    /// WebSocket endpoint for the depth stream
    pub ws_endpoint: String,

    /// REST endpoint serving full snapshots
    pub rest_endpoint: String,

    /// Unix socket path for the top-of-book relay
    pub relay_socket_path: String,

    /// File path for sampled ladder telemetry
    pub sample_path: String,

    /// Top-of-book depth published per side
    pub depth_levels: usize,

    /// Per-symbol mutation queue capacity
    pub queue_capacity: usize,

    /// Ladder sampling interval in seconds
    pub sample_interval_secs: u64,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,

    /// Port for the health/metrics HTTP server
    pub http_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let symbols: Vec<String> = env::var("SYMBOLS")
            .unwrap_or_else(|_| "BTCUSDT,ETHUSDT".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .collect();

        Ok(Self {
            symbols,
            exchange_code: env::var("EXCHANGE_CODE").unwrap_or_else(|_| "bnc".to_string()),
            ws_endpoint: env::var("WS_ENDPOINT")
                .unwrap_or_else(|_| "wss://stream.binance.com:9443/ws".to_string()),
            rest_endpoint: env::var("REST_ENDPOINT")
                .unwrap_or_else(|_| "https://api.binance.com/api/v3".to_string()),
            relay_socket_path: env::var("RELAY_SOCKET_PATH")
                .unwrap_or_else(|_| "/tmp/depthcast.sock".to_string()),
            sample_path: env::var("SAMPLE_PATH")
                .unwrap_or_else(|_| "/tmp/depthcast-samples.jsonl".to_string()),
            depth_levels: env::var("DEPTH_LEVELS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            queue_capacity: env::var("QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
            sample_interval_secs: env::var("SAMPLE_INTERVAL_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "9090".to_string())
                .parse()
                .unwrap_or(9090),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            exchange_code: "bnc".to_string(),
            ws_endpoint: "wss://stream.binance.com:9443/ws".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            relay_socket_path: "/tmp/depthcast.sock".to_string(),
            sample_path: "/tmp/depthcast-samples.jsonl".to_string(),
            depth_levels: 5,
            queue_capacity: 1024,
            sample_interval_secs: 1,
            reconnect_delay_ms: 1000,
            http_port: 9090,
        }
    }
}
