//! Exchange feed connection
//!
//! Owns one WebSocket connection, its reconnect discipline, and the path
//! from raw frames to the dispatch router. After every (re)connect a fresh
//! snapshot is fetched and dispatched before any diff is trusted: sequence
//! continuity never survives a reconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::WebSocketClient;
use crate::config::Config;
use crate::dispatch::{DecodedEvent, EventRouter, EventTag};
use crate::error::{FeedError, Result};
use crate::exchange::ExchangeAdapter;

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Cooldown period after which reconnect attempts are reset (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;
/// Ping after this long without data
const KEEPALIVE_SECS: u64 = 30;
/// Reconnect when nothing arrives for this long
const RECV_TIMEOUT_SECS: u64 = 45;

/// One exchange connection feeding the dispatch router
pub struct FeedConnection {
    config: Arc<Config>,
    adapter: Arc<dyn ExchangeAdapter>,
    router: EventRouter,
    client: WebSocketClient,
    http: reqwest::Client,
    reconnect_attempts: u32,
    last_successful_connection: Option<Instant>,
}

impl FeedConnection {
    pub fn new(config: Arc<Config>, adapter: Arc<dyn ExchangeAdapter>, router: EventRouter) -> Self {
        let url = adapter.stream_url(&config.ws_endpoint, &config.symbols);
        Self {
            config,
            adapter,
            router,
            client: WebSocketClient::new(&url),
            http: reqwest::Client::new(),
            reconnect_attempts: 0,
            last_successful_connection: None,
        }
    }

    /// Run the connection indefinitely with automatic reconnection
    pub async fn run(&mut self) -> Result<()> {
        info!(exchange = self.adapter.code(), "Starting feed connection");

        loop {
            // Reset the attempt counter once the connection has been stable
            // for a while
            if let Some(last_success) = self.last_successful_connection {
                if last_success.elapsed() > Duration::from_secs(RECONNECT_COOLDOWN_SECS)
                    && self.reconnect_attempts > 0
                {
                    info!(
                        previous_attempts = self.reconnect_attempts,
                        "Resetting reconnect counter after cooldown period"
                    );
                    self.reconnect_attempts = 0;
                }
            }

            match self.connect_and_process().await {
                Ok(()) => {
                    info!("Feed processing completed, reconnecting...");
                    sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!(error = %e, "Feed connection error");
                    self.reconnect_attempts += 1;

                    let base_delay = self.config.reconnect_delay_ms
                        * 2u64.pow(self.reconnect_attempts.min(6));
                    let delay = Duration::from_millis(base_delay.min(MAX_BACKOFF_MS));

                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_secs = delay.as_secs(),
                        "Reconnecting after error..."
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn connect_and_process(&mut self) -> Result<()> {
        self.client.connect().await?;
        self.last_successful_connection = Some(Instant::now());
        self.reconnect_attempts = 0;

        // Books must be reseeded before any diff from this connection is
        // applied.
        self.seed_books().await?;

        let mut last_message = Instant::now();
        let keepalive = Duration::from_secs(KEEPALIVE_SECS);
        let recv_timeout = Duration::from_secs(RECV_TIMEOUT_SECS);

        loop {
            match timeout(recv_timeout, self.client.recv()).await {
                Ok(Ok(Some(text))) => {
                    last_message = Instant::now();
                    self.process_frame(&text).await?;
                }
                Ok(Ok(None)) => {
                    if last_message.elapsed() > keepalive {
                        if let Err(e) = self.client.ping().await {
                            warn!(error = %e, "Failed to send keepalive ping");
                        }
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No message within timeout, sending keepalive"
                    );
                    if self.client.ping().await.is_err() {
                        return Err(FeedError::ConnectionTimeout);
                    }
                }
            }
        }
    }

    /// Fetch a fresh snapshot per symbol and route it through the dispatcher
    async fn seed_books(&self) -> Result<()> {
        for symbol in &self.config.symbols {
            let url =
                self.adapter
                    .snapshot_url(&self.config.rest_endpoint, symbol, self.config.depth_levels);

            info!(symbol = %symbol, url = %url, "Fetching order book snapshot");

            let body = self.http.get(&url).send().await?.text().await?;
            let snapshot = self.adapter.decode_snapshot(symbol, &body)?;

            self.router
                .dispatch(EventTag::Snapshot, DecodedEvent::Snapshot(snapshot))
                .await?;

            info!(symbol = %symbol, "Order book reseeded");
        }

        Ok(())
    }

    /// Classify one raw frame and route it
    ///
    /// Decode failures are logged and dropped; the connection stays up.
    async fn process_frame(&self, raw: &str) -> Result<()> {
        match self.adapter.classify(raw) {
            Ok((tag, event)) => self.router.dispatch(tag, event).await,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable frame");
                Ok(())
            }
        }
    }
}
