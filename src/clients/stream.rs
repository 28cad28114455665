// WebSocket streaming client feeding the bounded inbound queue

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::core::types::{InboundQueue, StreamClient};
use crate::error::TradingResult;

type WsSink = futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Push connection to the broker's market-data/order-update feed.
///
/// On connect, a reader task is spawned that copies every text payload into
/// the inbound queue until the connection drops, at which point the liveness
/// flag clears and the health monitor takes over reconnection.
pub struct AlpacaStream {
    url: String,
    api_key_id: String,
    api_secret_key: String,
    queue: InboundQueue,
    connected: Arc<AtomicBool>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl AlpacaStream {
    pub fn new(config: &GatewayConfig, queue: InboundQueue) -> Self {
        Self {
            url: config.stream_url.clone(),
            api_key_id: config.api_key_id.clone(),
            api_secret_key: config.api_secret_key.clone(),
            queue,
            connected: Arc::new(AtomicBool::new(false)),
            writer: tokio::sync::Mutex::new(None),
            retry_attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[async_trait::async_trait]
impl StreamClient for AlpacaStream {
    async fn connect(&self) -> TradingResult<()> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let auth = json!({
            "action": "auth",
            "key": self.api_key_id,
            "secret": self.api_secret_key,
        });
        sink.send(Message::Text(auth.to_string())).await?;

        *self.writer.lock().await = Some(sink);
        self.connected.store(true, Ordering::SeqCst);
        info!(url = %self.url, "stream connected");

        let queue = self.queue.clone();
        let connected = self.connected.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => queue.push(text),
                    Ok(Message::Close(_)) => {
                        info!("stream closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "stream read error");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    async fn connect_with_retries(&self) -> bool {
        for attempt in 1..=self.retry_attempts {
            match self.connect().await {
                Ok(()) => return true,
                Err(e) => warn!(attempt, error = %e, "stream connect attempt failed"),
            }
            sleep(self.retry_delay).await;
        }
        false
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("stream closed");
    }
}
