//! Media capture: file selection, clipboard paste and voice recording.
//!
//! File and paste capture are silent no-ops for anything that is not an
//! image. Voice recording goes through an [`AudioSource`]; the device is
//! owned by a [`Recording`] and released when the recording stops or is
//! dropped, whichever comes first.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use cm_studio_core::media::{DEFAULT_AUDIO_MIME, is_image_mime, mime_from_file_name};
use cm_studio_core::{AudioClip, ImageAsset, MediaError};
use serde::Deserialize;
use thiserror::Error;

/// Capture errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device access was refused.
    #[error("Microphone access is required for voice input.")]
    PermissionDenied,
    /// No capture device could be opened.
    #[error("No microphone is available: {0}")]
    DeviceUnavailable(String),
    /// The recording stopped before any audio was captured.
    #[error("Nothing was recorded.")]
    EmptyRecording,
    /// Captured bytes could not be wrapped as media.
    #[error(transparent)]
    Media(#[from] MediaError),
}

// =============================================================================
// Images
// =============================================================================

/// Accept a selected file as the new original image.
///
/// The MIME type is taken from `declared_mime` when present, else guessed
/// from `file_name`. Returns `None` for non-image or empty files.
#[must_use]
pub fn capture_file(
    file_name: Option<&str>,
    declared_mime: Option<&str>,
    bytes: Vec<u8>,
) -> Option<ImageAsset> {
    let mime_type = declared_mime
        .map(str::trim)
        .filter(|mime| !mime.is_empty() && *mime != "application/octet-stream")
        .or_else(|| file_name.and_then(mime_from_file_name))?;
    if !is_image_mime(mime_type) {
        tracing::debug!(mime_type, "Ignoring non-image file");
        return None;
    }
    ImageAsset::new(mime_type, bytes).ok()
}

/// One item of a paste event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardItem {
    /// MIME type reported by the clipboard.
    pub mime_type: String,
    /// Base64 payload or data URL.
    pub data: String,
}

/// Take the first image out of a paste event.
///
/// Items that are not images, or whose payload does not decode, are
/// skipped. Returns `None` when nothing usable was pasted.
#[must_use]
pub fn capture_paste(items: &[ClipboardItem]) -> Option<ImageAsset> {
    items
        .iter()
        .filter(|item| is_image_mime(&item.mime_type))
        .find_map(|item| {
            let data = item.data.trim();
            let decoded = if data.starts_with("data:") {
                ImageAsset::from_data_url(data)
            } else {
                ImageAsset::from_base64(&item.mime_type, data)
            };
            decoded
                .inspect_err(|e| tracing::debug!(error = %e, "Skipping undecodable paste item"))
                .ok()
        })
}

// =============================================================================
// Audio
// =============================================================================

/// An acquired capture device.
pub trait AudioTrack: Send {
    /// MIME type of the captured audio.
    fn mime_type(&self) -> &str;

    /// Stop capturing and return what was recorded.
    fn finish(&mut self) -> Vec<u8>;

    /// Release the device. Called exactly once per track.
    fn release(&mut self);
}

/// Something that can hand out an exclusive capture device.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Acquire the device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::PermissionDenied`] when access is refused.
    async fn acquire(&self) -> Result<Box<dyn AudioTrack>, CaptureError>;
}

/// A recording in progress. Owns the device until stopped or dropped.
pub struct Recording {
    track: Option<Box<dyn AudioTrack>>,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("active", &self.track.is_some())
            .finish()
    }
}

impl Recording {
    /// Acquire the device and start recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be acquired.
    pub async fn start(source: &dyn AudioSource) -> Result<Self, CaptureError> {
        let track = source.acquire().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Could not acquire microphone");
        })?;
        Ok(Self { track: Some(track) })
    }

    /// Stop recording and release the device.
    ///
    /// The device is released before the clip is validated, so it is free
    /// even when this returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EmptyRecording`] if nothing was captured.
    pub fn stop(mut self) -> Result<AudioClip, CaptureError> {
        let Some(mut track) = self.track.take() else {
            return Err(CaptureError::EmptyRecording);
        };
        let bytes = track.finish();
        let mime_type = track.mime_type().to_string();
        track.release();

        if bytes.is_empty() {
            return Err(CaptureError::EmptyRecording);
        }
        Ok(AudioClip::new(mime_type, bytes)?)
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        if let Some(mut track) = self.track.take() {
            tracing::debug!("Recording dropped before stop, releasing device");
            track.release();
        }
    }
}

/// Audio source backed by a file on disk. Used for batch transcription.
#[derive(Debug, Clone)]
pub struct FileAudioSource {
    path: PathBuf,
}

impl FileAudioSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioSource for FileAudioSource {
    async fn acquire(&self) -> Result<Box<dyn AudioTrack>, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ => CaptureError::DeviceUnavailable(format!("{}: {e}", self.path.display())),
        })?;
        let mime_type = self
            .path
            .to_str()
            .and_then(mime_from_file_name)
            .unwrap_or(DEFAULT_AUDIO_MIME);
        Ok(Box::new(BufferedTrack {
            mime_type: mime_type.to_string(),
            bytes,
        }))
    }
}

struct BufferedTrack {
    mime_type: String,
    bytes: Vec<u8>,
}

impl AudioTrack for BufferedTrack {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    fn release(&mut self) {
        self.bytes = Vec::new();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingTrack {
        bytes: Vec<u8>,
        releases: Arc<AtomicUsize>,
    }

    impl AudioTrack for CountingTrack {
        fn mime_type(&self) -> &str {
            "audio/webm"
        }

        fn finish(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.bytes)
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingSource {
        bytes: Vec<u8>,
        releases: Arc<AtomicUsize>,
        deny: bool,
    }

    #[async_trait]
    impl AudioSource for CountingSource {
        async fn acquire(&self) -> Result<Box<dyn AudioTrack>, CaptureError> {
            if self.deny {
                return Err(CaptureError::PermissionDenied);
            }
            Ok(Box::new(CountingTrack {
                bytes: self.bytes.clone(),
                releases: Arc::clone(&self.releases),
            }))
        }
    }

    fn source(bytes: Vec<u8>) -> (CountingSource, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            bytes,
            releases: Arc::clone(&releases),
            deny: false,
        };
        (source, releases)
    }

    #[test]
    fn test_capture_file_accepts_images() {
        let image = capture_file(Some("ring.PNG"), None, vec![1, 2, 3]).expect("image");
        assert_eq!(image.mime_type(), "image/png");

        let image = capture_file(None, Some("image/webp"), vec![1]).expect("image");
        assert_eq!(image.mime_type(), "image/webp");
    }

    #[test]
    fn test_capture_file_ignores_non_images() {
        assert!(capture_file(Some("notes.txt"), None, vec![1]).is_none());
        assert!(capture_file(None, Some("application/pdf"), vec![1]).is_none());
        assert!(capture_file(Some("ring.jpg"), None, Vec::new()).is_none());
        assert!(capture_file(None, None, vec![1]).is_none());
    }

    #[test]
    fn test_capture_paste_takes_first_image() {
        let items = vec![
            ClipboardItem {
                mime_type: "text/plain".to_string(),
                data: "aGVsbG8=".to_string(),
            },
            ClipboardItem {
                mime_type: "image/png".to_string(),
                data: "iVBORw0KGgo=".to_string(),
            },
            ClipboardItem {
                mime_type: "image/jpeg".to_string(),
                data: "/9j/4AAQ".to_string(),
            },
        ];
        let image = capture_paste(&items).expect("image");
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn test_capture_paste_without_image_is_noop() {
        let items = vec![ClipboardItem {
            mime_type: "text/html".to_string(),
            data: "PGI+aGk8L2I+".to_string(),
        }];
        assert!(capture_paste(&items).is_none());
        assert!(capture_paste(&[]).is_none());
    }

    #[tokio::test]
    async fn test_stop_releases_device() {
        let (source, releases) = source(vec![1, 2, 3]);
        let recording = Recording::start(&source).await.expect("start");
        let clip = recording.stop().expect("clip");
        assert_eq!(clip.len(), 3);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_recording_still_releases_device() {
        let (source, releases) = source(Vec::new());
        let recording = Recording::start(&source).await.expect("start");
        assert!(matches!(
            recording.stop().unwrap_err(),
            CaptureError::EmptyRecording
        ));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let (source, releases) = source(vec![1]);
        let recording = Recording::start(&source).await.expect("start");
        drop(recording);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denied_device() {
        let (mut source, releases) = source(vec![1]);
        source.deny = true;
        let err = Recording::start(&source).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Microphone access is required for voice input."
        );
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_file_audio_source_missing_file() {
        let source = FileAudioSource::new("/nonexistent/dictation.webm");
        let err = Recording::start(&source).await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    }
}
