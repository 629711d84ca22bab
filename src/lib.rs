// ABOUTME: Library root for tranche - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod inventory;
pub mod output;
pub mod types;
