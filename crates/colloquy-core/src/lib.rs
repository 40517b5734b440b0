//! Colloquy core — shared types, configuration, and the durable session store.
//!
//! This crate contains:
//! - **types**: chat messages, tool-call references, tool results, usage
//! - **config**: schema, JSON loading, env overrides
//! - **session**: one-directory-per-session durable log with resume support
//! - **utils**: path helpers, timestamps, token estimation

pub mod config;
pub mod session;
pub mod types;
pub mod utils;
