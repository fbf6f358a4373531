//! # cadre-client
//!
//! Worker-side access to the coordinator behind one [`CoordinatorClient`]
//! contract:
//!
//! - [`RemoteCoordinatorClient`]: HTTP against a running `cadre serve`
//! - [`LocalFileCoordinatorClient`]: an embedded coordinator over a JSON
//!   state file, for when no server is reachable
//!
//! [`connect`] picks one at startup by probing the server's `/health`.

#![deny(unsafe_code)]

pub mod client;
pub mod connect;
pub mod errors;
pub mod local;
pub mod lock;
pub mod remote;

pub use client::{ClientMode, CoordinatorClient};
pub use connect::{connect, connect_with};
pub use errors::{ClientError, Result};
pub use local::LocalFileCoordinatorClient;
pub use lock::StateFileLock;
pub use remote::RemoteCoordinatorClient;
