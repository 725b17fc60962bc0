use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// Event raised by an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    Binary(Vec<u8>),
    /// Transport-level error. A `Closed` event always follows.
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// Frame written to an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// An open transport, exposed as a pair of channels.
///
/// The transport ends when `inbound` yields `Closed` or returns `None`.
pub struct Link {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Link {
    /// Create a link plus the remote halves that drive it
    pub fn pair() -> (
        Link,
        mpsc::UnboundedSender<TransportEvent>,
        mpsc::UnboundedReceiver<OutboundFrame>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: out_tx,
                inbound: in_rx,
            },
            in_tx,
            out_rx,
        )
    }
}

/// Opens transports to a realtime endpoint.
///
/// A failed `open` is reported like a connection that opened and closed
/// straight away; the client's reconnect policy applies.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Link>;
}

/// Failures that prevent a connection attempt from being made at all.
///
/// These are not retried.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectError {
    MissingToken,
    InvalidEndpoint(String),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::MissingToken => write!(f, "no session token available"),
            ConnectError::InvalidEndpoint(url) => {
                write!(f, "invalid realtime endpoint '{}': expected ws:// or wss://", url)
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// Build `<endpoint>?token=<token>`.
///
/// The token goes into the query string, ahead of any `#fragment`.
pub fn endpoint_url(endpoint: &str, token: Option<&str>) -> Result<String, ConnectError> {
    if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
        return Err(ConnectError::InvalidEndpoint(endpoint.to_string()));
    }

    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return Err(ConnectError::MissingToken),
    };

    let (base, fragment) = match endpoint.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (endpoint, None),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    let mut url = format!("{}{}token={}", base, separator, urlencoding::encode(token));
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    Ok(url)
}
