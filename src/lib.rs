// Domain records exchanged with the server
pub mod model;

// Session token and signed-in user
pub mod session;

// Client configuration and user preferences
pub mod config;

// REST client with offline fallbacks
pub mod api;

// Realtime WebSocket notification client
pub mod realtime;

// Chat list and conversation view model
pub mod chat;

// Profile editing
pub mod profile;
