#![forbid(unsafe_code)]

//! Caching reverse proxy that maintains an upstream tracker session.
//!
//! The upstream vehicle-tracking platform authenticates with a cookie
//! session that expires unpredictably and signals expiry by answering with
//! HTML instead of JSON. This crate owns the session lifecycle (single-flight
//! login, lazy TTL, invalidation on failure signals) and a per-vehicle
//! snapshot cache used both to shed load and as a fallback when the upstream
//! misbehaves.

pub mod config;
pub mod errors;
pub mod proxy;
pub mod server;
pub mod session;
pub mod upstream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
