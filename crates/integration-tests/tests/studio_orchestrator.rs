//! Integration tests for the edit, dictation and caption flows.
//!
//! The orchestrator runs against in-process fakes; no network is used.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use cm_integration_tests::{FakeMic, Harness, audio, edited, image, workspace};
use cm_studio::capture::Recording;
use cm_studio::services::{PromptUpdate, RemoteError, StudioError};
use cm_studio_core::{AspectRatio, Operation, ValidationError};
use secrecy::SecretString;

const TIMEOUT: Duration = Duration::from_secs(5);

fn prompt(text: &str) -> PromptUpdate {
    PromptUpdate {
        prompt: Some(text.to_string()),
        ..PromptUpdate::default()
    }
}

// =============================================================================
// Edits and history
// =============================================================================

#[tokio::test]
async fn test_apply_edit_prepends_one_history_entry() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();

    studio.set_original(&ws, image(1));
    studio
        .update_prompt(
            &ws,
            PromptUpdate {
                prompt: Some("Remove the background".to_string()),
                aspect_ratio: Some(AspectRatio::Portrait),
                ..PromptUpdate::default()
            },
        )
        .expect("prompt update");

    let outcome = studio.apply_edit(&ws).await.expect("edit should succeed");
    assert_eq!(outcome.processed, edited("Remove the background"));

    ws.with_session(|session| {
        assert_eq!(session.history().len(), 1);
        let latest = session.history().latest().expect("entry");
        assert_eq!(latest.id(), outcome.entry_id);
        assert_eq!(Some(latest.processed()), session.processed());
        assert_eq!(latest.original(), &image(1));
        assert_eq!(latest.aspect_ratio(), AspectRatio::Portrait);
        assert!(session.error().is_none());
    });
    assert_eq!(harness.gemini.calls(Operation::Edit), 1);
    assert!(!ws.pending().edit);
}

#[tokio::test]
async fn test_set_original_clears_processed_and_prompt() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();

    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Add shadow")).expect("prompt");
    studio.apply_edit(&ws).await.expect("edit");

    studio.set_original(&ws, image(2));
    ws.with_session(|session| {
        assert_eq!(session.original(), Some(&image(2)));
        assert!(session.processed().is_none());
        assert_eq!(session.prompt(), "");
        // History survives a new original
        assert_eq!(session.history().len(), 1);
    });
}

#[tokio::test]
async fn test_empty_prompt_makes_no_call() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("   ")).expect("prompt");

    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(
        err,
        StudioError::Validation(ValidationError::EmptyPrompt)
    ));
    assert_eq!(harness.gemini.calls(Operation::Edit), 0);
    ws.with_session(|session| {
        assert_eq!(session.error(), Some("Please describe the edit."));
    });
}

#[tokio::test]
async fn test_missing_image_makes_no_call() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.update_prompt(&ws, prompt("Clean")).expect("prompt");

    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(
        err,
        StudioError::Validation(ValidationError::MissingImage)
    ));
    assert_eq!(harness.gemini.calls(Operation::Edit), 0);
}

#[tokio::test]
async fn test_failed_edit_leaves_images_unchanged() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("First")).expect("prompt");
    let first = studio.apply_edit(&ws).await.expect("first edit");

    harness
        .gemini
        .fail_with(RemoteError::Failed("500 Internal".to_string()));
    studio.update_prompt(&ws, prompt("Second")).expect("prompt");
    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert_eq!(err.to_string(), "Error generating edit.");

    assert!(!ws.pending().edit);
    ws.with_session(|session| {
        assert_eq!(session.original(), Some(&image(1)));
        assert_eq!(session.processed(), Some(&first.processed));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.error(), Some("Error generating edit."));
    });
}

#[tokio::test]
async fn test_missing_image_in_response_is_reported() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Clean")).expect("prompt");

    harness.gemini.fail_with(RemoteError::MissingPayload(
        "No image was returned by the model.".to_string(),
    ));
    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert_eq!(err.to_string(), "No image was returned by the model.");
    ws.with_session(|session| assert!(session.processed().is_none()));
}

#[tokio::test]
async fn test_restore_keeps_history_length_and_order() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));

    let mut ids = Vec::new();
    for text in ["one", "two", "three"] {
        studio.update_prompt(&ws, prompt(text)).expect("prompt");
        ids.push(studio.apply_edit(&ws).await.expect("edit").entry_id);
    }
    let order_before: Vec<_> =
        ws.with_session(|session| session.history().iter().map(|e| e.id()).collect());

    studio
        .restore(&ws, *ids.first().expect("first id"))
        .expect("restore");

    ws.with_session(|session| {
        let order_after: Vec<_> = session.history().iter().map(|e| e.id()).collect();
        assert_eq!(order_after, order_before);
        assert_eq!(session.prompt(), "one");
        assert_eq!(session.processed(), Some(&edited("one")));
    });
}

#[tokio::test]
async fn test_history_capacity_evicts_oldest() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = cm_studio::services::Workspace::new(
        cm_studio_core::WorkspaceId::generate(),
        std::num::NonZeroUsize::new(2).expect("non-zero"),
    );
    studio.set_original(&ws, image(1));

    for text in ["a", "b", "c"] {
        studio.update_prompt(&ws, prompt(text)).expect("prompt");
        studio.apply_edit(&ws).await.expect("edit");
    }

    ws.with_session(|session| {
        let prompts: Vec<_> = session.history().iter().map(|e| e.prompt().to_string()).collect();
        assert_eq!(prompts, vec!["c", "b"]);
    });
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_second_edit_while_pending_is_busy() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = Arc::new(workspace());
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Slow")).expect("prompt");

    let gate = harness.gemini.hold();
    let first = tokio::spawn({
        let studio = studio.clone();
        let ws = Arc::clone(&ws);
        async move { studio.apply_edit(&ws).await }
    });
    gate.wait_started().await;
    assert!(ws.pending().edit);

    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(err, StudioError::Busy(Operation::Edit)));

    gate.release();
    first.await.expect("join").expect("first edit");
    assert!(!ws.pending().edit);
    assert_eq!(harness.gemini.calls(Operation::Edit), 1);
}

#[tokio::test]
async fn test_busy_edit_keeps_error_banner() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = Arc::new(workspace());
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Slow")).expect("prompt");

    let gate = harness.gemini.hold();
    let first = tokio::spawn({
        let studio = studio.clone();
        let ws = Arc::clone(&ws);
        async move { studio.apply_edit(&ws).await }
    });
    gate.wait_started().await;
    ws.with_session(|session| session.set_error("Error generating caption."));

    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(err, StudioError::Busy(Operation::Edit)));
    ws.with_session(|session| {
        assert_eq!(session.error(), Some("Error generating caption."));
    });

    gate.release();
    first.await.expect("join").expect("first edit");
}

#[tokio::test]
async fn test_transcription_runs_alongside_edit() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = Arc::new(workspace());
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("clean background")).expect("prompt");

    let gate = harness.gemini.hold();
    let edit = tokio::spawn({
        let studio = studio.clone();
        let ws = Arc::clone(&ws);
        async move { studio.apply_edit(&ws).await }
    });
    gate.wait_started().await;
    harness.gemini.unhold();

    harness.gemini.push_transcript("add soft shadow");
    let outcome = studio
        .transcribe(&ws, audio())
        .await
        .expect("transcription while edit pending");
    assert_eq!(outcome.prompt, "clean background add soft shadow");

    gate.release();
    edit.await.expect("join").expect("edit");
}

#[tokio::test]
async fn test_new_original_discards_in_flight_edit() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = Arc::new(workspace());
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Old context")).expect("prompt");

    let gate = harness.gemini.hold();
    let edit = tokio::spawn({
        let studio = studio.clone();
        let ws = Arc::clone(&ws);
        async move { studio.apply_edit(&ws).await }
    });
    gate.wait_started().await;

    studio.set_original(&ws, image(2));
    gate.release();

    let err = edit.await.expect("join").unwrap_err();
    assert!(matches!(err, StudioError::Superseded(Operation::Edit)));
    ws.with_session(|session| {
        assert_eq!(session.original(), Some(&image(2)));
        assert!(session.processed().is_none());
        assert!(session.history().is_empty());
        assert!(session.error().is_none());
    });
}

#[tokio::test]
async fn test_abort_cancels_pending_edit() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = Arc::new(workspace());
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Never mind")).expect("prompt");

    let gate = harness.gemini.hold();
    let edit = tokio::spawn({
        let studio = studio.clone();
        let ws = Arc::clone(&ws);
        async move { studio.apply_edit(&ws).await }
    });
    gate.wait_started().await;

    assert!(studio.abort(&ws, Operation::Edit));
    let err = edit.await.expect("join").unwrap_err();
    assert!(matches!(err, StudioError::Cancelled(Operation::Edit)));
    assert!(!ws.pending().edit);
    assert!(!studio.abort(&ws, Operation::Edit));

    // The slot is usable again
    harness.gemini.unhold();
    studio.apply_edit(&ws).await.expect("edit after abort");
}

#[tokio::test]
async fn test_slow_edit_times_out() {
    let harness = Harness::new();
    let studio = harness.studio(Duration::from_millis(50));
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Slow")).expect("prompt");

    let _gate = harness.gemini.hold();
    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(err, StudioError::TimedOut(Operation::Edit, _)));
    assert!(err.to_string().ends_with("request timed out after 0 seconds."));
    assert!(!ws.pending().edit);
    ws.with_session(|session| {
        assert!(session.processed().is_none());
        assert!(session.error().is_some());
    });
}

#[tokio::test]
async fn test_closed_workspace_rejects_calls() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Clean")).expect("prompt");

    ws.close();
    let err = studio.apply_edit(&ws).await.unwrap_err();
    assert!(matches!(err, StudioError::Closed));
    assert_eq!(harness.gemini.calls(Operation::Edit), 0);
}

// =============================================================================
// Dictation
// =============================================================================

#[tokio::test]
async fn test_transcripts_append_with_single_space() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();

    harness.gemini.push_transcript("clean background");
    harness.gemini.push_transcript("  add soft shadow ");
    studio.transcribe(&ws, audio()).await.expect("first");
    let outcome = studio.transcribe(&ws, audio()).await.expect("second");

    assert!(outcome.appended);
    assert_eq!(outcome.prompt, "clean background add soft shadow");
}

#[tokio::test]
async fn test_blank_transcript_leaves_prompt_unchanged() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.update_prompt(&ws, prompt("keep me")).expect("prompt");

    let outcome = studio.transcribe(&ws, audio()).await.expect("transcribe");
    assert!(!outcome.appended);
    assert_eq!(outcome.prompt, "keep me");
}

#[tokio::test]
async fn test_dictation_releases_mic_on_success() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    let mic = FakeMic::default();

    harness.gemini.push_transcript("polish the gold");
    let recording = Recording::start(&mic).await.expect("start");
    let outcome = studio.dictate(&ws, recording).await.expect("dictate");

    assert_eq!(outcome.prompt, "polish the gold");
    assert_eq!(mic.acquired(), 1);
    assert_eq!(mic.released(), 1);
}

#[tokio::test]
async fn test_dictation_releases_mic_on_failure() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.update_prompt(&ws, prompt("before")).expect("prompt");
    let mic = FakeMic::default();

    harness
        .gemini
        .fail_with(RemoteError::Failed("503".to_string()));
    let recording = Recording::start(&mic).await.expect("start");
    let err = studio.dictate(&ws, recording).await.unwrap_err();

    assert!(matches!(err, StudioError::Remote { .. }));
    assert_eq!(mic.released(), 1);
    assert!(!ws.pending().transcription);
    ws.with_session(|session| assert_eq!(session.prompt(), "before"));
}

#[tokio::test]
async fn test_silent_recording_is_rejected_and_released() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    let mic = FakeMic {
        silent: true,
        ..FakeMic::default()
    };

    let recording = Recording::start(&mic).await.expect("start");
    let err = studio.dictate(&ws, recording).await.unwrap_err();

    assert!(matches!(err, StudioError::Capture(_)));
    assert_eq!(mic.released(), 1);
    assert_eq!(harness.gemini.calls(Operation::Transcription), 0);
}

#[tokio::test]
async fn test_denied_microphone_reports_permission() {
    let mic = FakeMic {
        denied: true,
        ..FakeMic::default()
    };
    let err = Recording::start(&mic).await.err().expect("denied");
    assert_eq!(
        err.to_string(),
        "Microphone access is required for voice input."
    );
    assert_eq!(mic.acquired(), 0);
}

// =============================================================================
// Captions and export
// =============================================================================

#[tokio::test]
async fn test_caption_prefers_processed_image() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));

    studio.generate_caption(&ws, "").await.expect("caption of original");
    studio.update_prompt(&ws, prompt("Shine")).expect("prompt");
    studio.apply_edit(&ws).await.expect("edit");
    let caption = studio
        .generate_caption(&ws, "Mother's day")
        .await
        .expect("caption of processed");

    assert_eq!(
        harness.gemini.caption_images(),
        vec![image(1), edited("Shine")]
    );
    ws.with_session(|session| assert_eq!(session.caption(), Some(caption.as_str())));
}

#[tokio::test]
async fn test_failed_caption_leaves_state_unchanged() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Shine")).expect("prompt");
    let edit = studio.apply_edit(&ws).await.expect("edit");
    let caption = studio
        .generate_caption(&ws, "")
        .await
        .expect("first caption");

    harness
        .gemini
        .fail_with(RemoteError::Failed("503 Unavailable".to_string()));
    let err = studio.generate_caption(&ws, "Sale").await.unwrap_err();
    assert_eq!(err.to_string(), "Error generating caption.");

    assert!(!ws.pending().caption);
    ws.with_session(|session| {
        assert_eq!(session.caption(), Some(caption.as_str()));
        assert_eq!(session.original(), Some(&image(1)));
        assert_eq!(session.processed(), Some(&edit.processed));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.error(), Some("Error generating caption."));
    });
}

#[tokio::test]
async fn test_caption_without_image_is_rejected() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();

    let err = studio.generate_caption(&ws, "").await.unwrap_err();
    assert!(matches!(
        err,
        StudioError::Validation(ValidationError::MissingImage)
    ));
    assert_eq!(harness.gemini.calls(Operation::Caption), 0);
}

#[tokio::test]
async fn test_download_uses_dated_file_name() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 9).expect("date");

    assert!(studio.download(&ws, today).is_none());

    studio.set_original(&ws, image(1));
    studio.update_prompt(&ws, prompt("Clean")).expect("prompt");
    studio.apply_edit(&ws).await.expect("edit");

    let download = studio.download(&ws, today).expect("download");
    assert_eq!(download.file_name, "CM_Studio_20250309.png");
    assert_eq!(download.image, edited("Clean"));
}

#[tokio::test]
async fn test_upload_requires_token_and_sends_current_image() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(7));

    let err = studio.upload(&ws, None, None).await.unwrap_err();
    assert!(matches!(err, StudioError::MissingToken));

    let stored = studio
        .upload(
            &ws,
            Some("ring.png".to_string()),
            Some(SecretString::from("ya29.token")),
        )
        .await
        .expect("upload");
    assert_eq!(stored.name, "ring.png");

    let uploads = harness.store.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = uploads.first().expect("one upload");
    assert_eq!(upload.image, image(7));
    assert_eq!(upload.token, "ya29.token");
}

#[tokio::test]
async fn test_upload_with_revoked_token_reports_permission() {
    let harness = Harness::new();
    let studio = harness.studio(TIMEOUT);
    let ws = workspace();
    studio.set_original(&ws, image(1));

    let err = studio
        .upload(&ws, None, Some(SecretString::from("revoked")))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not upload to Google Drive. Check permissions."
    );
}
