//! Observer push channel: connection state, fan-out, message dispatch.

pub mod broadcast;
pub mod connection;
pub mod event_bridge;
pub mod handler;
pub mod session;
