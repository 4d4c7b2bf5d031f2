//! Ephemera State Management
//! 
//! Provides the single-slot document store, its passive expiry check and
//! the credential ring guarding it.

pub mod keys;
pub mod store;
pub mod snapshot;

pub use keys::*;
pub use store::*;
pub use snapshot::*;
