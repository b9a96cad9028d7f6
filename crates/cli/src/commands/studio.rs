//! One-shot studio operations against Gemini.
//!
//! Each command runs in a throwaway workspace, so the same validation and
//! error messages apply as in the web app.
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY` - Gemini API key
//! - `GEMINI_IMAGE_MODEL` / `GEMINI_TEXT_MODEL` - Model overrides

use std::path::{Path, PathBuf};

use chrono::Utc;
use cm_studio::capture::{CaptureError, FileAudioSource, Recording, capture_file};
use cm_studio::config::ConfigError;
use cm_studio::services::{
    BackendInitError, Backends, PromptUpdate, StudioError, StudioService, Workspace,
};
use cm_studio::StudioConfig;
use cm_studio_core::{AspectRatio, WorkspaceId};
use thiserror::Error;

/// Errors that can occur while running a studio command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP clients could not be built.
    #[error(transparent)]
    Backend(#[from] BackendInitError),

    /// File could not be read or written.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not an image.
    #[error("Not an image: {0}")]
    NotAnImage(PathBuf),

    /// The studio operation failed.
    #[error(transparent)]
    Studio(#[from] StudioError),

    /// Audio could not be read.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Prompt controls for `edit`.
#[derive(Debug, Clone)]
pub struct EditOptions {
    pub prompt: Option<String>,
    pub preset: Option<String>,
    pub aspect_ratio: AspectRatio,
}

/// Edit an image and write the result.
///
/// # Errors
///
/// Returns an error if the input is not an image, the prompt is empty, or
/// the edit fails.
pub async fn edit(
    input: &Path,
    options: EditOptions,
    output: Option<PathBuf>,
) -> Result<(), CommandError> {
    let (studio, workspace) = open_workspace()?;
    load_image(&studio, &workspace, input).await?;

    studio.update_prompt(
        &workspace,
        PromptUpdate {
            prompt: options.prompt,
            preset_id: options.preset,
            aspect_ratio: Some(options.aspect_ratio),
        },
    )?;

    tracing::info!(input = %input.display(), "Applying edit...");
    let outcome = studio.apply_edit(&workspace).await?;

    let output = match output {
        Some(path) => path,
        None => studio
            .download(&workspace, Utc::now().date_naive())
            .map_or_else(|| PathBuf::from("edited.jpg"), |d| PathBuf::from(d.file_name)),
    };
    tokio::fs::write(&output, outcome.processed.bytes())
        .await
        .map_err(|source| CommandError::Io {
            path: output.clone(),
            source,
        })?;

    tracing::info!(output = %output.display(), "Edit saved");
    Ok(())
}

/// Print a caption for an image.
///
/// # Errors
///
/// Returns an error if the input is not an image or the call fails.
#[allow(clippy::print_stdout)]
pub async fn caption(input: &Path, idea: &str) -> Result<(), CommandError> {
    let (studio, workspace) = open_workspace()?;
    load_image(&studio, &workspace, input).await?;

    let caption = studio.generate_caption(&workspace, idea).await?;
    println!("{caption}");
    Ok(())
}

/// Print the transcript of an audio file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the call fails.
#[allow(clippy::print_stdout)]
pub async fn transcribe(input: &Path) -> Result<(), CommandError> {
    let (studio, workspace) = open_workspace()?;

    let recording = Recording::start(&FileAudioSource::new(input)).await?;
    let outcome = studio.dictate(&workspace, recording).await?;

    if outcome.transcript.is_empty() {
        tracing::warn!("No speech detected");
    } else {
        println!("{}", outcome.transcript);
    }
    Ok(())
}

fn open_workspace() -> Result<(StudioService, Workspace), CommandError> {
    let config = StudioConfig::from_env()?;
    let backends = Backends::from_config(&config)?;
    let studio = StudioService::new(backends, config.gemini.request_timeout);
    let workspace = Workspace::new(WorkspaceId::generate(), config.workspaces.history_capacity);
    Ok((studio, workspace))
}

async fn load_image(
    studio: &StudioService,
    workspace: &Workspace,
    path: &Path,
) -> Result<(), CommandError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let image = capture_file(path.to_str(), None, bytes)
        .ok_or_else(|| CommandError::NotAnImage(path.to_path_buf()))?;
    studio.set_original(workspace, image);
    Ok(())
}
