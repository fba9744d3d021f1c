//! Core services for refinery-mcp.
//!
//! This crate owns the store seam (the `RefineryStore` trait with a hosted
//! Supabase backend and an in-memory backend) and the control plane that
//! authenticates callers and implements every tool operation on top of it.

pub mod control;
pub mod store;
