//! agri-sentinel/crates/ag-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Agri-Sentinel.

pub mod advisor;
pub mod error;
pub mod filter;
pub mod models;
pub mod service;
pub mod stats;
pub mod traits;
pub mod voice;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
