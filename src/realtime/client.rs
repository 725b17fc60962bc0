use crate::config::RealtimeConfig;
use crate::realtime::envelope::{decode_frame, Inbound};
use crate::realtime::policy::ReconnectPolicy;
use crate::realtime::registry::{Listener, ListenerRegistry, SubscriberId};
use crate::realtime::state::ConnectionState;
use crate::realtime::transport::{endpoint_url, Connector, Link, OutboundFrame, TransportEvent};
use crate::realtime::ws::WsConnector;
use crate::session::TokenProvider;
use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Result of [`RealtimeClient::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open transport
    Sent,
    /// Not written (connection not open or payload not serializable)
    Dropped,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

/// Counters for observing the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealtimeStats {
    pub connect_attempts: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
}

#[derive(Default)]
struct Counters {
    connect_attempts: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

struct Inner {
    /// Endpoint without the token parameter (safe to log)
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    registry: ListenerRegistry,
    state_tx: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Realtime notification client.
///
/// Owns at most one transport connection at a time, fans every decoded
/// inbound frame out to the registered listeners and reconnects after
/// closure according to its [`ReconnectPolicy`].
///
/// Cloning is cheap; clones share the same connection. `connect` must be
/// called from within a Tokio runtime.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a client for the configured WebSocket endpoint
    pub fn new(config: &RealtimeConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let policy = config.reconnect.to_policy()?;
        Ok(Self::with_connector(
            config.url.clone(),
            tokens,
            Arc::new(WsConnector::new()),
            policy,
        ))
    }

    /// Create a client with an explicit transport and reconnect policy
    pub fn with_connector(
        endpoint: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                tokens,
                connector,
                policy,
                registry: ListenerRegistry::new(),
                state_tx,
                outbound: Mutex::new(None),
                supervisor: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// Start connecting. No-op while a connection task is already running.
    pub fn connect(&self) {
        let mut supervisor = lock(&self.inner.supervisor);
        if let Some(handle) = supervisor.as_ref() {
            if !handle.is_finished() {
                debug!("Realtime client already running");
                return;
            }
        }

        info!(endpoint = %self.inner.endpoint, "Starting realtime client");
        let inner = Arc::clone(&self.inner);
        *supervisor = Some(tokio::spawn(async move { inner.supervise().await }));
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// A `connect()` issued while this is in progress wins: its connection
    /// is left running.
    pub async fn disconnect(&self) {
        let handle = {
            let mut supervisor = lock(&self.inner.supervisor);
            self.inner.close_link();
            supervisor.take()
        };
        let Some(handle) = handle else {
            self.inner.set_state(ConnectionState::Disconnected);
            return;
        };
        handle.abort();
        let _ = handle.await;

        let supervisor = lock(&self.inner.supervisor);
        if supervisor.is_some() {
            debug!("Realtime client restarted during disconnect");
            return;
        }
        // The aborted task may have opened a link after the first close
        self.inner.close_link();
        self.inner.set_state(ConnectionState::Disconnected);
        drop(supervisor);
        info!("Realtime client disconnected");
    }

    /// Serialize `payload` as JSON and write it if the connection is open.
    ///
    /// Never fails: a payload that cannot be written is dropped with a warning.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> SendOutcome {
        let outcome = self.inner.try_send(payload);
        let counter = match outcome {
            SendOutcome::Sent => &self.inner.counters.messages_sent,
            SendOutcome::Dropped => &self.inner.counters.messages_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> SubscriberId {
        self.inner.registry.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool {
        self.inner.registry.remove(listener)
    }

    pub fn remove_listener_by_id(&self, id: SubscriberId) -> bool {
        self.inner.registry.remove_by_id(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether a connection task is running (connected, connecting or
    /// waiting to reconnect)
    pub fn is_running(&self) -> bool {
        lock(&self.inner.supervisor)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn stats(&self) -> RealtimeStats {
        let c = &self.inner.counters;
        RealtimeStats {
            connect_attempts: c.connect_attempts.load(Ordering::Relaxed),
            frames_received: c.frames_received.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            messages_sent: c.messages_sent.load(Ordering::Relaxed),
            messages_dropped: c.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let mut previous = next;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            previous = *state;
            *state = next;
            true
        });

        if changed {
            if !previous.can_transition_to(next) {
                warn!(from = %previous, to = %next, "Unexpected connection state transition");
            }
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    fn close_link(&self) {
        if let Some(outbound) = lock(&self.outbound).take() {
            let _ = outbound.send(OutboundFrame::Close);
        }
    }

    /// Connection task: connect, pump frames, wait, reconnect.
    async fn supervise(&self) {
        // Reconnect attempts since the last successful open
        let mut attempt: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            let token = self.tokens.token();
            let url = match endpoint_url(&self.endpoint, token.as_deref()) {
                Ok(url) => url,
                Err(e) => {
                    error!(
                        endpoint = %self.endpoint,
                        error = %e,
                        "Failed to start realtime connection, not retrying"
                    );
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            };

            self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);
            match self.connector.open(&url).await {
                Ok(link) => {
                    attempt = 0;
                    self.pump(link).await;
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.endpoint,
                        error = %e,
                        "Realtime connection attempt failed"
                    );
                    self.set_state(ConnectionState::Closing);
                }
            }
            self.set_state(ConnectionState::Disconnected);

            attempt = attempt.saturating_add(1);
            match self.policy.delay_for(attempt) {
                Some(delay) => {
                    info!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Scheduling realtime reconnect"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        attempts = attempt - 1,
                        "Realtime reconnect attempts exhausted, giving up"
                    );
                    return;
                }
            }
        }
    }

    /// Run one open link until it closes
    async fn pump(&self, link: Link) {
        let Link {
            outbound,
            mut inbound,
        } = link;

        *lock(&self.outbound) = Some(outbound);
        self.set_state(ConnectionState::Open);
        info!(endpoint = %self.endpoint, "Realtime connection open");

        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Text(text) => self.handle_frame(&text),
                TransportEvent::Binary(data) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                TransportEvent::Error(e) => {
                    warn!(error = %e, "Realtime transport error");
                }
                TransportEvent::Closed { code, reason } => {
                    info!(code = ?code, reason = %reason, "Realtime connection closed");
                    break;
                }
            }
        }

        self.set_state(ConnectionState::Closing);
        lock(&self.outbound).take();
    }

    fn handle_frame(&self, text: &str) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        let inbound = match decode_frame(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, len = text.len(), "Dropping inbound frame");
                return;
            }
        };

        match &inbound {
            Inbound::Invalid { kind, reason, .. } => {
                warn!(kind = %kind, reason = %reason, "Inbound frame failed schema validation");
            }
            Inbound::Unrecognized { kind, .. } => {
                debug!(kind = ?kind, "Inbound frame has unrecognized type");
            }
            Inbound::Event(_) => {}
        }

        let report = self.registry.dispatch(&inbound);
        debug!(
            kind = ?inbound.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "Frame dispatched"
        );
    }

    fn try_send<T: Serialize + ?Sized>(&self, payload: &T) -> SendOutcome {
        let state = *self.state_tx.borrow();
        if !state.is_open() {
            warn!(state = %state, "WebSocket not connected, message not sent");
            return SendOutcome::Dropped;
        }

        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            warn!("WebSocket not connected, message not sent");
            return SendOutcome::Dropped;
        };

        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                return SendOutcome::Dropped;
            }
        };

        match sender.send(OutboundFrame::Text(text)) {
            Ok(()) => SendOutcome::Sent,
            Err(_) => {
                warn!("WebSocket closed before message could be sent");
                SendOutcome::Dropped
            }
        }
    }
}
