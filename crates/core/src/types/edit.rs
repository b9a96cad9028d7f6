//! Edit and caption requests, and their local validation.
//!
//! Requests are validated on construction so that an invalid request can
//! never reach a remote service.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::media::{AudioClip, ImageAsset};

/// Local validation failures. These never reach the network.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// No source image has been uploaded.
    #[error("Upload an image first.")]
    MissingImage,
    /// The edit instruction is empty.
    #[error("Please describe the edit.")]
    EmptyPrompt,
    /// The aspect ratio string is not one of the supported ratios.
    #[error("Unsupported aspect ratio.")]
    UnknownAspectRatio,
}

/// Target framing for an edited image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1, square feed post.
    #[serde(rename = "1:1")]
    Square,
    /// 4:5, portrait feed post.
    #[default]
    #[serde(rename = "4:5")]
    Portrait,
    /// 9:16, stories and reels.
    #[serde(rename = "9:16")]
    Story,
    /// 16:9, landscape banner.
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// All supported ratios, in display order.
    pub const ALL: [Self; 4] = [Self::Portrait, Self::Story, Self::Square, Self::Landscape];

    /// The `W:H` string understood by the image model.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "4:5",
            Self::Story => "9:16",
            Self::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or(ValidationError::UnknownAspectRatio)
    }
}

/// A validated image-edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    source: ImageAsset,
    prompt: String,
    aspect_ratio: AspectRatio,
}

impl EditRequest {
    /// Validate and build an edit request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingImage`] when there is no source
    /// image and [`ValidationError::EmptyPrompt`] when the prompt is blank.
    pub fn new(
        source: Option<ImageAsset>,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Self, ValidationError> {
        let source = source.ok_or(ValidationError::MissingImage)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        Ok(Self {
            source,
            prompt: prompt.to_string(),
            aspect_ratio,
        })
    }

    /// Image to edit.
    #[must_use]
    pub const fn source(&self) -> &ImageAsset {
        &self.source
    }

    /// Trimmed user instruction.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Target framing.
    #[must_use]
    pub const fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }
}

/// A validated caption request. The idea text is optional steering context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    image: ImageAsset,
    idea: Option<String>,
}

impl CaptionRequest {
    /// Build a caption request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingImage`] when there is no image.
    pub fn new(image: Option<ImageAsset>, idea: &str) -> Result<Self, ValidationError> {
        let image = image.ok_or(ValidationError::MissingImage)?;
        let idea = idea.trim();
        Ok(Self {
            image,
            idea: (!idea.is_empty()).then(|| idea.to_string()),
        })
    }

    /// Image the caption describes.
    #[must_use]
    pub const fn image(&self) -> &ImageAsset {
        &self.image
    }

    /// Optional idea text.
    #[must_use]
    pub fn idea(&self) -> Option<&str> {
        self.idea.as_deref()
    }
}

/// A transcription request. Audio presence is guaranteed by [`AudioClip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    audio: AudioClip,
}

impl TranscriptionRequest {
    /// Wrap a recorded clip.
    #[must_use]
    pub const fn new(audio: AudioClip) -> Self {
        Self { audio }
    }

    /// Recorded audio.
    #[must_use]
    pub const fn audio(&self) -> &AudioClip {
        &self.audio
    }
}
