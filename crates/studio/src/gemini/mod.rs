//! Google Generative Language API integration.
//!
//! # Operations
//!
//! - **Image edit**: inline source image + jewelry-editor instruction,
//!   `imageConfig.aspectRatio` for reframing
//! - **Transcription**: inline audio + fixed transcription instruction
//! - **Caption**: inline image + optional idea + brand-voice instruction
//!
//! # API Reference
//!
//! - Base URL: `https://generativelanguage.googleapis.com/v1beta`
//! - Authentication: `x-goog-api-key` header

mod client;
mod error;
pub mod prompts;
mod types;

pub use client::GeminiClient;
pub use error::{ApiError, ApiErrorResponse, GeminiError};
pub use types::*;
