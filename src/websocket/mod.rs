//! WebSocket transport for exchange connections

mod client;
mod manager;

pub use client::WebSocketClient;
pub use manager::FeedConnection;
