//! # cadre-advisory
//!
//! Optional advisory layer for assignment and conflict decisions.
//!
//! The coordinator never depends on an answer from here. [`AdvisoryBridge`]
//! bounds every call with a timeout and applies recommendations only when
//! they are confident and name a session with spare capacity. With no service
//! configured, [`NoopAdvisor`] makes every call fall back immediately.

#![deny(unsafe_code)]

pub mod advisor;
pub mod bridge;
pub mod errors;
pub mod http;

pub use advisor::{Advisor, NoopAdvisor};
pub use bridge::{ASSIGNMENT_TIE, AdvisoryBridge};
pub use errors::{AdvisoryError, Result};
pub use http::HttpAdvisor;
