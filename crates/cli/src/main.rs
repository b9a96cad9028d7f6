//! CM Studio CLI - batch edits, captions and transcription.
//!
//! # Usage
//!
//! ```bash
//! # Edit a photo with a free-form prompt
//! cm-cli edit --input ring.jpg --prompt "Remove the background" --output ring-clean.jpg
//!
//! # Edit with a preset and framing
//! cm-cli edit --input ring.jpg --preset remove-bg --aspect 4:5
//!
//! # Write a caption
//! cm-cli caption --input ring.jpg --idea "Mother's day gift"
//!
//! # Transcribe a voice note
//! cm-cli transcribe --input note.webm
//!
//! # List presets
//! cm-cli presets
//! ```
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY` - Gemini API key (required except for `presets`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cm_studio_core::AspectRatio;

mod commands;

#[derive(Parser)]
#[command(name = "cm-cli")]
#[command(author, version, about = "CM Studio command-line tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit a photo
    Edit {
        /// Source image
        #[arg(short, long)]
        input: PathBuf,

        /// Edit instruction
        #[arg(short, long, conflicts_with = "preset", required_unless_present = "preset")]
        prompt: Option<String>,

        /// Preset id (see `presets`)
        #[arg(long)]
        preset: Option<String>,

        /// Framing (`1:1`, `4:5`, `9:16`, `16:9`)
        #[arg(short, long, default_value = "4:5")]
        aspect: AspectRatio,

        /// Output file (defaults to `CM_Studio_YYYYMMDD.<ext>`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a social-media caption for a photo
    Caption {
        /// Image to describe
        #[arg(short, long)]
        input: PathBuf,

        /// Creative direction
        #[arg(long)]
        idea: Option<String>,
    },
    /// Transcribe a voice note
    Transcribe {
        /// Audio file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List the built-in edit presets
    Presets,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Edit {
            input,
            prompt,
            preset,
            aspect,
            output,
        } => {
            let options = commands::studio::EditOptions {
                prompt,
                preset,
                aspect_ratio: aspect,
            };
            commands::studio::edit(&input, options, output).await?;
        }
        Commands::Caption { input, idea } => {
            commands::studio::caption(&input, idea.as_deref().unwrap_or_default()).await?;
        }
        Commands::Transcribe { input } => commands::studio::transcribe(&input).await?,
        Commands::Presets => commands::presets::list(),
    }
    Ok(())
}
