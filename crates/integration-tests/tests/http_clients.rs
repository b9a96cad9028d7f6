//! Integration tests for the Gemini, ledger and Drive clients.
//!
//! Each test serves a small axum app on a loopback port that plays the
//! remote service.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use cm_integration_tests::{image, spawn_server};
use cm_studio::config::{DriveConfig, GeminiConfig, LedgerConfig};
use cm_studio::drive::{DriveClient, DriveError, UploadFile};
use cm_studio::gemini::{GeminiClient, GeminiError};
use cm_studio::ledger::{IDEMPOTENCY_KEY_HEADER, LedgerClient, LedgerError};
use cm_studio_core::{
    AspectRatio, CaptionRequest, EditRequest, SaleInput, SaleRecord, StaffMember,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Requests seen by a fake server.
#[derive(Clone, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl Seen {
    fn push(&self, headers: HeaderMap, body: Value) {
        self.requests.lock().expect("lock").push((headers, body));
    }

    fn all(&self) -> Vec<(HeaderMap, Value)> {
        self.requests.lock().expect("lock").clone()
    }
}

// =============================================================================
// Gemini
// =============================================================================

#[derive(Clone)]
struct GeminiFake {
    seen: Seen,
    models: Arc<Mutex<Vec<String>>>,
    reply: Arc<dyn Fn() -> Response + Send + Sync>,
}

async fn generate_content(
    State(fake): State<GeminiFake>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.models.lock().expect("lock").push(call);
    fake.seen.push(headers, body);
    (fake.reply)()
}

async fn gemini(reply: impl Fn() -> Response + Send + Sync + 'static) -> (GeminiClient, GeminiFake) {
    let fake = GeminiFake {
        seen: Seen::default(),
        models: Arc::default(),
        reply: Arc::new(reply),
    };
    let app = Router::new()
        .route("/v1beta/models/{call}", post(generate_content))
        .with_state(fake.clone());
    let addr = spawn_server(app).await;

    let client = GeminiClient::new(&GeminiConfig {
        api_key: SecretString::from("AIzaSyTestKey-0123456789abcdef"),
        base_url: format!("http://{addr}/v1beta"),
        image_model: "image-model".to_string(),
        text_model: "text-model".to_string(),
        request_timeout: TIMEOUT,
    })
    .expect("client");
    (client, fake)
}

fn image_reply() -> Response {
    let edited = image(42);
    Json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Here is your edit."},
                    {"inlineData": {"mimeType": "image/png", "data": edited.to_base64()}}
                ]
            },
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

#[tokio::test]
async fn test_edit_sends_image_prompt_and_aspect_ratio() {
    let (client, fake) = gemini(image_reply).await;
    let request =
        EditRequest::new(Some(image(1)), "Remove the background", AspectRatio::Story)
            .expect("valid request");

    let result = client.edit_image(&request).await.expect("edit");
    assert_eq!(result, image(42));

    assert_eq!(
        fake.models.lock().expect("lock").as_slice(),
        ["image-model:generateContent"]
    );
    let requests = fake.seen.all();
    let (headers, body) = requests.first().expect("one request");
    assert_eq!(
        headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()),
        Some("AIzaSyTestKey-0123456789abcdef")
    );

    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], image(1).to_base64());
    let instruction = parts[1]["text"].as_str().expect("text part");
    assert!(instruction.starts_with("Act as a professional high-end jewelry photo editor."));
    assert!(instruction.contains("Remove the background"));
    assert_eq!(body["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
}

#[tokio::test]
async fn test_edit_without_image_part_is_no_image() {
    let (client, _fake) = gemini(|| {
        Json(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't do that."}]}}]
        }))
        .into_response()
    })
    .await;
    let request = EditRequest::new(Some(image(1)), "Clean", AspectRatio::Square).expect("request");

    let err = client.edit_image(&request).await.unwrap_err();
    assert!(matches!(err, GeminiError::NoImage));
    assert_eq!(err.to_string(), "No image was returned by the model.");
}

#[tokio::test]
async fn test_blocked_prompt_is_reported() {
    let (client, _fake) = gemini(|| {
        Json(json!({"promptFeedback": {"blockReason": "SAFETY"}})).into_response()
    })
    .await;
    let request = EditRequest::new(Some(image(1)), "Clean", AspectRatio::Square).expect("request");

    let err = client.edit_image(&request).await.unwrap_err();
    assert!(matches!(err, GeminiError::Blocked(reason) if reason == "SAFETY"));
}

#[tokio::test]
async fn test_rate_limit_uses_retry_after() {
    let (client, _fake) = gemini(|| {
        (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "12")], "slow down").into_response()
    })
    .await;
    let request = EditRequest::new(Some(image(1)), "Clean", AspectRatio::Square).expect("request");

    let err = client.edit_image(&request).await.unwrap_err();
    assert!(matches!(err, GeminiError::RateLimited(12)));
}

#[tokio::test]
async fn test_api_error_message_is_extracted() {
    let (client, _fake) = gemini(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {"code": 400, "message": "Image too large", "status": "INVALID_ARGUMENT"}
            })),
        )
            .into_response()
    })
    .await;
    let request = EditRequest::new(Some(image(1)), "Clean", AspectRatio::Square).expect("request");

    let err = client.edit_image(&request).await.unwrap_err();
    assert!(
        matches!(err, GeminiError::Api { status: 400, ref message } if message == "Image too large")
    );
}

#[tokio::test]
async fn test_caption_uses_text_model_and_idea() {
    let (client, fake) = gemini(|| {
        Json(json!({
            "candidates": [{"content": {"parts": [{"text": "  Shine bright ✨ \n"}]}}]
        }))
        .into_response()
    })
    .await;
    let request = CaptionRequest::new(Some(image(3)), "Valentine's drop").expect("request");

    let caption = client.write_caption(&request).await.expect("caption");
    assert_eq!(caption, "Shine bright ✨");

    assert_eq!(
        fake.models.lock().expect("lock").as_slice(),
        ["text-model:generateContent"]
    );
    let requests = fake.seen.all();
    let (_, body) = requests.first().expect("one request");
    let instruction = body["contents"][0]["parts"][1]["text"]
        .as_str()
        .expect("text part");
    assert!(instruction.contains("Valentine's drop"));
}

#[tokio::test]
async fn test_empty_caption_is_no_text() {
    let (client, _fake) = gemini(|| Json(json!({"candidates": []})).into_response()).await;
    let request = CaptionRequest::new(Some(image(3)), "").expect("request");

    let err = client.write_caption(&request).await.unwrap_err();
    assert!(matches!(err, GeminiError::NoText));
}

// =============================================================================
// Ledger
// =============================================================================

fn sale() -> SaleRecord {
    let input = SaleInput {
        client: "Ana".to_string(),
        product: "Ring".to_string(),
        quantity: 1,
        unit_price: Decimal::from(350),
        total_cost: Decimal::from(120),
        ..SaleInput::default()
    };
    let staff = StaffMember::new("Carlos");
    SaleRecord::new(input, &staff, chrono::Utc::now()).expect("valid sale")
}

async fn ledger(status: StatusCode) -> (LedgerClient, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/exec",
            post(
                move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    seen.push(headers, body);
                    (status, "ok")
                },
            ),
        )
        .with_state(seen.clone());
    let addr = spawn_server(app).await;

    let client = LedgerClient::new(&LedgerConfig {
        webhook_url: Url::parse(&format!("http://{addr}/exec")).expect("url"),
        request_timeout: TIMEOUT,
    })
    .expect("client");
    (client, seen)
}

#[tokio::test]
async fn test_ledger_sends_row_with_idempotency_key() {
    let (client, seen) = ledger(StatusCode::OK).await;
    let record = sale();

    client.append(&record).await.expect("acknowledged");

    let requests = seen.all();
    assert_eq!(requests.len(), 1);
    let (headers, body) = requests.first().expect("request");
    let sale_id = record.id().to_string();
    assert_eq!(
        headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some(sale_id.as_str())
    );
    assert_eq!(body["saleId"], sale_id);
    assert_eq!(body["cliente"], "Ana");
    assert_eq!(body["recibeVenta"], "Carlos");
    assert_eq!(body["total"], json!(350.0));
}

#[tokio::test]
async fn test_ledger_retry_reuses_idempotency_key() {
    let (client, seen) = ledger(StatusCode::OK).await;
    let record = sale();

    client.append(&record).await.expect("first delivery");
    client.append(&record).await.expect("second delivery");

    let keys: Vec<_> = seen
        .all()
        .iter()
        .filter_map(|(headers, _)| {
            headers
                .get(IDEMPOTENCY_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys.first(), keys.last());
}

#[tokio::test]
async fn test_ledger_non_success_is_rejected() {
    let (client, _seen) = ledger(StatusCode::INTERNAL_SERVER_ERROR).await;

    let err = client.append(&sale()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected { status: 500, .. }));
}

// =============================================================================
// Drive
// =============================================================================

async fn drive_upload(headers: HeaderMap, mut multipart: Multipart) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer ya29.good");
    if !authorized {
        return (StatusCode::FORBIDDEN, "insufficient permissions").into_response();
    }

    let mut name = String::new();
    let mut file_bytes = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("metadata") => {
                let text = field.text().await.unwrap_or_default();
                let metadata: Value = serde_json::from_str(&text).unwrap_or_default();
                name = metadata["name"].as_str().unwrap_or_default().to_string();
            }
            Some("file") => {
                file_bytes = field.bytes().await.map(|b| b.len()).unwrap_or_default();
            }
            _ => {}
        }
    }

    Json(json!({
        "id": "drive-file-1",
        "webViewLink": format!("https://drive.example/{file_bytes}"),
        "name": name,
    }))
    .into_response()
}

async fn drive() -> DriveClient {
    let app = Router::new().route("/upload", post(drive_upload));
    let addr = spawn_server(app).await;
    DriveClient::new(&DriveConfig {
        upload_url: Url::parse(&format!("http://{addr}/upload")).expect("url"),
        folder_id: Some("folder-1".to_string()),
        request_timeout: TIMEOUT,
    })
    .expect("client")
}

#[tokio::test]
async fn test_drive_upload_sends_metadata_and_bytes() {
    let client = drive().await;
    let file = UploadFile {
        name: "CM_Studio_20250309.png".to_string(),
        image: image(9),
    };

    let stored = client
        .upload(&file, &SecretString::from("ya29.good"))
        .await
        .expect("upload");

    assert_eq!(stored.id, "drive-file-1");
    assert_eq!(stored.name, "CM_Studio_20250309.png");
    assert_eq!(
        stored.web_view_link.as_deref(),
        Some(format!("https://drive.example/{}", image(9).len()).as_str())
    );
}

#[tokio::test]
async fn test_drive_rejected_token_is_permission_error() {
    let client = drive().await;
    let file = UploadFile {
        name: "ring.png".to_string(),
        image: image(9),
    };

    let err = client
        .upload(&file, &SecretString::from("ya29.expired"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Permission));
    assert_eq!(
        err.to_string(),
        "Could not upload to Google Drive. Check permissions."
    );
}
