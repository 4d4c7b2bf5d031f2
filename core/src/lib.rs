//! Ephemera Core Library
//! 
//! Core types, traits, and configuration for the Ephemera single-slot store.
//! This crate provides the foundation shared by the state and node crates.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
