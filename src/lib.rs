//! Inventory tracking for household moves.
//!
//! Moves and their packages are kept as JSON documents in a string-keyed
//! store (`services::kv_store`). `MoveStore` owns the `moves` slot,
//! `PackageStore` owns one `packages-<moveId>` slot, and
//! `InventoryService` coordinates the two.

pub mod commands;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod validation;
