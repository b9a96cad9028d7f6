//! CM Studio Core - Shared types library.
//!
//! This crate provides the types used across all CM Studio components:
//! - `studio` - Orchestrator, remote clients and the JSON HTTP API
//! - `cli` - Command-line front-end for batch edits and captions
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP clients, no clocks. Callers pass timestamps in. This keeps it
//! lightweight and fully unit-testable.
//!
//! # Modules
//!
//! - [`types`] - Media assets, edit requests, the session and history store,
//!   sale records, staff sessions, presets and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
