//! Audioshelf - self-hosted audiobook library server
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod fetch;
pub mod library;
pub mod playback;
pub mod server;
pub mod streaming;
