//! Shared types for Counsel crates
//!
//! Keeps the HTTP-facing error contract and per-request context free of
//! any web framework so domain crates can depend on them cheaply.

mod context;
mod error;

pub use context::{ClientIdentity, RequestContext};
pub use error::HttpError;
