//! Top-of-book relay
//!
//! Forwards the view produced after each applied mutation to the downstream
//! message-bus boundary over a Unix socket.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::book::TopOfBook;
use crate::error::{FeedError, Result};

/// Relay boundary consumed by the mutation pipeline
///
/// Publishing is best-effort: the book is the source of truth and a failed
/// publish must never stall the writer.
#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn publish(&self, record: &TopOfBook);
}

/// Publisher sending top-of-book records via Unix socket
///
/// MessagePack body with a big-endian u32 length prefix. Connects lazily and
/// reconnects on the next publish after a write failure.
pub struct SocketPublisher {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl SocketPublisher {
    /// Create a new publisher
    pub async fn new(socket_path: &str) -> Result<Self> {
        let publisher = Self {
            socket_path: socket_path.to_string(),
            stream: Mutex::new(None),
        };

        // Try initial connection (may fail if the consumer isn't ready)
        if let Err(e) = publisher.connect().await {
            warn!(error = %e, "Initial relay connection failed, will retry on publish");
        }

        Ok(publisher)
    }

    /// Connect to the Unix socket
    async fn connect(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);

        if !path.exists() {
            return Err(FeedError::Ipc(format!(
                "Socket path does not exist: {}",
                self.socket_path
            )));
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            FeedError::Ipc(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        let mut guard = self.stream.lock().await;
        *guard = Some(stream);

        info!(path = %self.socket_path, "Connected to relay socket");
        Ok(())
    }

    fn frame(record: &TopOfBook) -> Result<Vec<u8>> {
        let data = rmp_serde::to_vec(record)
            .map_err(|e| FeedError::Serialization(format!("Failed to serialize: {}", e)))?;

        let len = (data.len() as u32).to_be_bytes();
        let mut message = Vec::with_capacity(4 + data.len());
        message.extend_from_slice(&len);
        message.extend_from_slice(&data);
        Ok(message)
    }
}

#[async_trait]
impl RelaySink for SocketPublisher {
    async fn publish(&self, record: &TopOfBook) {
        let message = match Self::frame(record) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, topic = %record.topic, "Dropping unserializable record");
                return;
            }
        };

        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            drop(guard);
            if let Err(e) = self.connect().await {
                debug!(error = %e, "Failed to reconnect to relay socket");
                return;
            }
            guard = self.stream.lock().await;
        }

        if let Some(stream) = guard.as_mut() {
            match stream.write_all(&message).await {
                Ok(_) => {
                    debug!(
                        topic = %record.topic,
                        sequence = record.sequence,
                        "Published top of book"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write to relay socket");
                    *guard = None; // Mark as disconnected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_length_prefixed() {
        let record = TopOfBook {
            symbol: "btcusd".to_string(),
            topic: "btcusd.tst".to_string(),
            sequence: 7,
            bids: vec![["100.50".to_string(), "2".to_string()]],
            asks: vec![],
        };

        let message = SocketPublisher::frame(&record).unwrap();
        let len = u32::from_be_bytes([message[0], message[1], message[2], message[3]]) as usize;
        assert_eq!(len, message.len() - 4);

        let decoded: TopOfBook = rmp_serde::from_slice(&message[4..]).unwrap();
        assert_eq!(decoded.sequence, 7);
        assert_eq!(decoded.bids, record.bids);
    }
}
