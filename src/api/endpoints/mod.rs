//! API endpoint handlers.
//!
//! Each module corresponds to one screen or feature of the web client.
//! Handlers do I/O-free validation inline and push database, hashing,
//! analysis and rendering work onto the blocking pool.

pub mod analysis;
pub mod auth;
pub mod export;
pub mod health;
pub mod languages;
pub mod profile;
pub mod reports;
