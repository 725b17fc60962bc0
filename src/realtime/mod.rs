//! Realtime notification client.
//!
//! ```text
//!   TokenProvider ──► RealtimeClient ──► Connector (WebSocket)
//!                          │   ▲
//!               decode_frame   │ send()
//!                          ▼
//!                   ListenerRegistry ──► Listener, Listener, ...
//! ```
//!
//! The client owns one connection at a time, publishes its
//! [`ConnectionState`] through a watch channel and reconnects after
//! closure according to a [`ReconnectPolicy`].

mod client;
pub mod envelope;
mod policy;
pub mod registry;
mod state;
pub mod transport;
mod ws;

pub use client::{RealtimeClient, RealtimeStats, SendOutcome};
pub use envelope::{decode_frame, ClientMessage, FrameError, Inbound, ServerEvent};
pub use policy::ReconnectPolicy;
pub use registry::{DeliveryReport, Listener, ListenerRegistry, SubscriberId};
pub use state::ConnectionState;
pub use transport::{endpoint_url, ConnectError, Connector, Link, OutboundFrame, TransportEvent};
pub use ws::WsConnector;
