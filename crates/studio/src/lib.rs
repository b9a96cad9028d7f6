//! CM Studio service library.
//!
//! Workspaces hold one editing session each. Handlers in [`routes`] drive
//! the session through [`services::StudioService`] (image edits, dictation
//! and captions against Gemini) and [`services::SalesService`] (staff
//! sign-in and the sale ledger webhook).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod capture;
pub mod config;
pub mod drive;
pub mod error;
pub mod gemini;
pub mod ledger;
pub mod routes;
pub mod services;
pub mod state;

pub use config::StudioConfig;
pub use error::AppError;
pub use state::{AppState, StudioOptions};
