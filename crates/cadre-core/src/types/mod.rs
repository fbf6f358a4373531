//! Domain and wire types.
//!
//! Wire types use `#[serde(rename_all = "camelCase")]`; status enums
//! serialize lowercase and event types snake_case.

mod advisory;
mod api;
mod event;
mod session;
mod status;
mod task;

pub use advisory::*;
pub use api::*;
pub use event::*;
pub use session::*;
pub use status::*;
pub use task::*;
