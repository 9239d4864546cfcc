// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod admin;
pub mod auth;
pub mod health;
pub mod me;
