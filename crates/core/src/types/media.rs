//! Binary media assets and their transport encoding.
//!
//! Images and audio cross every network boundary as base64 data URLs
//! (`data:<mime>;base64,<payload>`). The types here keep the raw bytes and
//! the MIME type together so that the encoding happens in exactly one place.

use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// MIME type used when an image's type cannot be determined.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// MIME type produced by browser `MediaRecorder` captures.
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Errors that can occur when decoding transport-encoded media.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The payload is empty.
    #[error("media payload is empty")]
    Empty,
    /// The data URL does not have the `data:<mime>;base64,` shape.
    #[error("malformed data URL")]
    MalformedDataUrl,
    /// The base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
    /// The MIME type is not of the expected kind.
    #[error("unsupported media type: {0}")]
    UnsupportedType(String),
}

/// Returns `true` for `image/*` MIME types.
#[must_use]
pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// Returns `true` for `audio/*` MIME types.
#[must_use]
pub fn is_audio_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("audio/")
}

/// Guess a MIME type from a file name's extension.
#[must_use]
pub fn mime_from_file_name(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

/// File extension conventionally used for a MIME type.
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        _ => "jpg",
    }
}

/// Split a data URL into its MIME type and base64 payload.
fn split_data_url(input: &str) -> Result<(&str, &str), MediaError> {
    let rest = input
        .trim()
        .strip_prefix("data:")
        .ok_or(MediaError::MalformedDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(MediaError::MalformedDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(MediaError::MalformedDataUrl)?;
    if mime.is_empty() {
        return Err(MediaError::MalformedDataUrl);
    }
    Ok((mime, payload))
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, MediaError> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| MediaError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    Ok(bytes)
}

macro_rules! media_type {
    ($(#[$meta:meta])* $name:ident, $check:ident, $default_mime:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name {
            mime_type: String,
            bytes: Vec<u8>,
        }

        impl $name {
            /// Build from raw bytes and a MIME type.
            ///
            /// # Errors
            ///
            /// Returns an error if the payload is empty or the MIME type is of
            /// the wrong kind.
            pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, MediaError> {
                let mime_type: String = mime_type.into();
                let mime_type = mime_type.trim().to_ascii_lowercase();
                if !$check(&mime_type) {
                    return Err(MediaError::UnsupportedType(mime_type));
                }
                if bytes.is_empty() {
                    return Err(MediaError::Empty);
                }
                Ok(Self { mime_type, bytes })
            }

            /// Decode a `data:<mime>;base64,<payload>` URL.
            ///
            /// # Errors
            ///
            /// Returns an error if the URL is malformed, the payload is not
            /// valid base64, or the MIME type is of the wrong kind.
            pub fn from_data_url(input: &str) -> Result<Self, MediaError> {
                let (mime, payload) = split_data_url(input)?;
                Self::new(mime, decode_base64(payload)?)
            }

            /// Decode a bare base64 payload with an explicit MIME type.
            ///
            /// # Errors
            ///
            /// Returns an error if the payload is not valid base64 or the MIME
            /// type is of the wrong kind.
            pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, MediaError> {
                Self::new(mime_type, decode_base64(payload)?)
            }

            /// Accept either a data URL or a bare base64 payload.
            ///
            /// Bare payloads are tagged with the default MIME type.
            ///
            /// # Errors
            ///
            /// Returns an error if decoding fails.
            pub fn from_transport(input: &str) -> Result<Self, MediaError> {
                if input.trim_start().starts_with("data:") {
                    Self::from_data_url(input)
                } else {
                    Self::from_base64($default_mime, input)
                }
            }

            /// The MIME type (lowercase).
            #[must_use]
            pub fn mime_type(&self) -> &str {
                &self.mime_type
            }

            /// The raw bytes.
            #[must_use]
            pub fn bytes(&self) -> &[u8] {
                &self.bytes
            }

            /// Payload size in bytes.
            #[must_use]
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            /// Always `false`; empty payloads are rejected on construction.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }

            /// Base64 payload without the data URL prefix.
            #[must_use]
            pub fn to_base64(&self) -> String {
                STANDARD.encode(&self.bytes)
            }

            /// Full data URL.
            #[must_use]
            pub fn to_data_url(&self) -> String {
                format!("data:{};base64,{}", self.mime_type, self.to_base64())
            }

            /// Consume into the raw bytes.
            #[must_use]
            pub fn into_bytes(self) -> Vec<u8> {
                self.bytes
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("mime_type", &self.mime_type)
                    .field("len", &self.bytes.len())
                    .finish()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_data_url())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_transport(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

media_type!(
    /// An image payload (JPEG, PNG, WebP, ...).
    ///
    /// Serializes as a data URL.
    ImageAsset,
    is_image_mime,
    DEFAULT_IMAGE_MIME
);

media_type!(
    /// A recorded audio payload.
    ///
    /// Serializes as a data URL.
    AudioClip,
    is_audio_mime,
    DEFAULT_AUDIO_MIME
);
