//! Method registry, handlers and wire types shared by the HTTP routes and
//! the WebSocket channel.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;
