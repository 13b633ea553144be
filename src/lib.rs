//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `media-sync-workspace` and
//! enable `desktop-shims` to get the reqwest/SQLite/Tokio adapters wired into
//! `core-service` without naming each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;
