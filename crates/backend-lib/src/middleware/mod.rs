// crates/backend-lib/src/middleware/mod.rs

//! Middleware and extractors for the HTTP surface.

pub mod client_ip;
pub mod gate;

pub use client_ip::ClientIp;
pub use gate::request_gate;
