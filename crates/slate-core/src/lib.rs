//! Core types, wire protocol, project store, config, and errors for Slate.

pub mod change;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod store;
pub mod types;
