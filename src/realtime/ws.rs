use crate::realtime::transport::{Connector, Link, OutboundFrame, TransportEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// WebSocket transport over tokio-tungstenite.
///
/// Each open link runs two tasks: a reader that forwards frames as
/// [`TransportEvent`]s and a writer that drains [`OutboundFrame`]s.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Link> {
        let (stream, response) = connect_async(url)
            .await
            .context("WebSocket handshake failed")?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (mut sink, mut source) = stream.split();
        let (link, in_tx, mut out_rx) = Link::pair();

        // Writer
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let result = match frame {
                    OutboundFrame::Text(text) => sink.send(Message::Text(text)).await,
                    OutboundFrame::Close => {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!(error = %e, "Failed to send close frame");
                        }
                        break;
                    }
                };
                if let Err(e) = result {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Text(text),
                    Ok(Message::Binary(data)) => TransportEvent::Binary(data),
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                            .unwrap_or((None, String::new()));
                        let _ = in_tx.send(TransportEvent::Closed { code, reason });
                        return;
                    }
                    Ok(_) => {
                        // Ping/pong handled by tungstenite
                        continue;
                    }
                    Err(e) => {
                        let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                };
                if in_tx.send(event).is_err() {
                    // Client dropped the link
                    return;
                }
            }
            let _ = in_tx.send(TransportEvent::Closed {
                code: None,
                reason: String::new(),
            });
        });

        Ok(link)
    }
}
