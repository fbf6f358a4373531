//! # cadre-server
//!
//! axum HTTP + WebSocket boundary for the cadre coordinator.
//!
//! - HTTP routes: register, heartbeat, deregister, claim, complete, assign,
//!   task lookup, status, sync, health, Prometheus metrics
//! - `/ws` push channel: committed events fanned out to every observer, plus
//!   `{id, method, params}` requests over the same socket
//! - One `MethodRegistry` behind both transports
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use rpc::context::RpcContext;
pub use rpc::handlers::register_all;
pub use rpc::registry::MethodRegistry;
pub use server::CadreServer;
pub use shutdown::ShutdownCoordinator;
