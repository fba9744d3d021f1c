//! Storage models and schema constants for refinery-mcp.
//!
//! This crate defines the row shapes exchanged with the hosted table store,
//! the projections returned by the tools, and the filters and patches the
//! control plane hands to a store backend.

pub mod models;
pub mod schema;

pub use models::*;
