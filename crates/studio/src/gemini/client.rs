//! Generative Language API client.
//!
//! All three studio operations go through `models/{model}:generateContent`:
//! image edits use the image model, transcription and captions use the text
//! model.

use std::sync::Arc;

use cm_studio_core::media::{DEFAULT_IMAGE_MIME, is_image_mime};
use cm_studio_core::{CaptionRequest, EditRequest, ImageAsset, TranscriptionRequest};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::GeminiConfig;

use super::error::{ApiErrorResponse, GeminiError};
use super::prompts;
use super::types::{
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig, Part,
};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generative API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    base_url: String,
    image_model: String,
    text_model: String,
}

impl GeminiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| GeminiError::Parse(format!("Invalid API key format: {e}")))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                base_url: config.base_url.clone(),
                image_model: config.image_model.clone(),
                text_model: config.text_model.clone(),
            }),
        })
    }

    /// Apply an edit instruction to an image.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::NoImage`] if the response has no image part,
    /// or an error if the request fails.
    #[instrument(
        skip(self, request),
        fields(
            model = %self.inner.image_model,
            aspect_ratio = %request.aspect_ratio(),
            image_bytes = request.source().len(),
        )
    )]
    pub async fn edit_image(&self, request: &EditRequest) -> Result<ImageAsset, GeminiError> {
        let source = request.source();
        let body = GenerateContentRequest::user(vec![
            Part::inline(source.mime_type(), source.to_base64()),
            Part::text(prompts::edit_instruction(request.prompt())),
        ])
        .with_config(GenerationConfig {
            response_modalities: vec!["IMAGE".to_string()],
            image_config: Some(ImageConfig {
                aspect_ratio: request.aspect_ratio().as_str().to_string(),
            }),
            temperature: None,
        });

        let response = self.generate(&self.inner.image_model, &body).await?;

        let Some(blob) = response.first_inline_data() else {
            if let Some(reason) = response.block_reason() {
                return Err(GeminiError::Blocked(reason.to_string()));
            }
            tracing::warn!(
                finish_reason = ?response.candidates.first().and_then(|c| c.finish_reason.as_deref()),
                "Edit response contained no image"
            );
            return Err(GeminiError::NoImage);
        };

        let mime_type = if is_image_mime(&blob.mime_type) {
            blob.mime_type.as_str()
        } else {
            DEFAULT_IMAGE_MIME
        };
        ImageAsset::from_base64(mime_type, &blob.data)
            .map_err(|e| GeminiError::Parse(format!("Invalid image data: {e}")))
    }

    /// Transcribe recorded speech. The result may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(
        skip(self, request),
        fields(model = %self.inner.text_model, audio_bytes = request.audio().len())
    )]
    pub async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, GeminiError> {
        let audio = request.audio();
        let body = GenerateContentRequest::user(vec![
            Part::inline(audio.mime_type(), audio.to_base64()),
            Part::text(prompts::TRANSCRIPTION_INSTRUCTION),
        ])
        .with_config(GenerationConfig {
            temperature: Some(0.0),
            ..GenerationConfig::default()
        });

        let response = self.generate(&self.inner.text_model, &body).await?;
        if let Some(reason) = response.block_reason() {
            return Err(GeminiError::Blocked(reason.to_string()));
        }
        Ok(response.text().trim().to_string())
    }

    /// Write a social-media caption for an image.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::NoText`] if the model returns nothing, or an
    /// error if the request fails.
    #[instrument(
        skip(self, request),
        fields(model = %self.inner.text_model, has_idea = request.idea().is_some())
    )]
    pub async fn write_caption(&self, request: &CaptionRequest) -> Result<String, GeminiError> {
        let image = request.image();
        let body = GenerateContentRequest::user(vec![
            Part::inline(image.mime_type(), image.to_base64()),
            Part::text(prompts::caption_instruction(request.idea())),
        ]);

        let response = self.generate(&self.inner.text_model, &body).await?;
        if let Some(reason) = response.block_reason() {
            return Err(GeminiError::Blocked(reason.to_string()));
        }
        let caption = response.text().trim().to_string();
        if caption.is_empty() {
            return Err(GeminiError::NoText);
        }
        Ok(caption)
    }

    /// POST a `generateContent` request for `model`.
    async fn generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{model}:generateContent", self.inner.base_url);
        let response = self.inner.client.post(&url).json(body).send().await?;
        self.handle_response(response).await
    }

    /// Handle a response, parsing the body on success.
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| GeminiError::Parse(format!("Failed to parse response: {e}")))
        } else {
            Err(self.handle_error_status(status, response).await)
        }
    }

    /// Handle an error status code.
    async fn handle_error_status(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> GeminiError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return GeminiError::RateLimited(retry_after);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return GeminiError::Unauthorized("API key rejected".to_string());
        }

        match response.text().await {
            Ok(body) => {
                let message = serde_json::from_str::<ApiErrorResponse>(&body)
                    .map_or(body, |api_error| api_error.error.message);
                GeminiError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
            Err(e) => GeminiError::Http(e),
        }
    }
}
