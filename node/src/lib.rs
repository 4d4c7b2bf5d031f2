//! Ephemera Node Implementation
//!
//! Serves the single-slot store over HTTP:
//! - Request runtime (authentication, body decoding, store calls)
//! - HTTP API with cache-suppression headers
//! - Node lifecycle and builder

mod api;
mod node;
mod runtime;

pub use api::*;
pub use node::*;
pub use runtime::*;
