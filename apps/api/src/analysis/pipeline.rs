//! Upload/analysis pipeline: turns an uploaded PDF into a stored, reviewed record.
//!
//! Flow: upload PDF → rasterize page 1 → upload PNG → placeholder record →
//!       AI feedback (bounded retry) → clean + parse → overwrite record.
//!
//! Any stage failure aborts the flow. The placeholder record, once written,
//! is left in the store; the user retries by uploading again.

use bytes::Bytes;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::parse::{extract_text, parse_feedback};
use crate::analysis::prompts::prepare_instructions;
use crate::analysis::retry::request_feedback_with_retry;
use crate::analysis::Progress;
use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::raster::file_stem;
use crate::state::AppState;
use crate::storage::{sanitize_file_name, Namespace};

/// How much of an unparseable response is logged.
const RAW_LOG_CHARS: usize = 500;

/// A validated upload, ready for analysis.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub file_name: String,
    pub pdf: Bytes,
}

/// Records the failure as the last status line and returns the error
/// carrying the log so far.
fn stage_failed(
    progress: &mut Progress,
    reason: &str,
    cause: impl std::fmt::Display,
) -> AppError {
    error!("{reason}: {cause}");
    progress.status(AppError::analysis_message(reason));
    AppError::Analysis {
        reason: reason.to_string(),
        status_log: progress.lines().to_vec(),
    }
}

fn serialize_record(record: &ResumeRecord) -> Result<String, AppError> {
    serde_json::to_string(record)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize resume record: {e}")))
}

/// Runs the full pipeline in `ns` and returns the completed record.
pub async fn analyze_upload(
    state: &AppState,
    ns: &Namespace,
    request: UploadRequest,
    progress: &mut Progress,
) -> Result<ResumeRecord, AppError> {
    let id = Uuid::new_v4().to_string();
    let stem = format!(
        "{}-{}",
        file_stem(&sanitize_file_name(&request.file_name)),
        &id[..8]
    );

    // Step 1: store the PDF
    progress.status("Uploading the file...");
    let uploaded_pdf = state
        .files
        .upload(ns, &format!("{stem}.pdf"), request.pdf.clone(), "application/pdf")
        .await
        .map_err(|e| stage_failed(progress, "Failed to upload file", e))?;

    // Step 2: rasterize the first page
    progress.status("Converting to image...");
    let image = state
        .rasterizer
        .first_page_png(&request.pdf, &stem)
        .await
        .map_err(|e| stage_failed(progress, "Failed to convert PDF to image", e))?;

    // Step 3: store the preview image
    progress.status("Uploading the image...");
    let uploaded_image = state
        .files
        .upload(ns, &image.file_name, image.bytes, "image/png")
        .await
        .map_err(|e| stage_failed(progress, "Failed to upload image", e))?;

    // Step 4: placeholder record
    progress.status("Preparing data...");
    let mut record = ResumeRecord {
        id: id.clone(),
        resume_path: uploaded_pdf.path,
        image_path: uploaded_image.path,
        company_name: request.company_name,
        job_title: request.job_title,
        job_description: request.job_description,
        feedback: None,
    };
    let key = ResumeRecord::key(&id);
    state
        .kv
        .set(ns, &key, &serialize_record(&record)?)
        .await
        .map_err(|e| stage_failed(progress, "Failed to save resume data", e))?;

    // Step 5: AI feedback with bounded retry
    progress.status("Analyzing...");
    let prompt = prepare_instructions(&record.job_title, &record.job_description);
    let response = request_feedback_with_retry(
        state.feedback.as_ref(),
        &request.pdf,
        &prompt,
        state.retry,
        progress,
    )
    .await
    .map_err(|e| stage_failed(progress, "Failed to analyze resume after multiple attempts", e))?;

    // Step 6: clean and parse
    let text = extract_text(&response)
        .map_err(|e| stage_failed(progress, "Failed to parse analysis results", e))?;
    let feedback = parse_feedback(text).map_err(|e| {
        let preview: String = text.chars().take(RAW_LOG_CHARS).collect();
        error!("Unparseable feedback for resume {id}: {preview}...");
        stage_failed(progress, "Failed to parse analysis results", e)
    })?;

    // Step 7: overwrite with real feedback
    record.feedback = Some(feedback);
    state
        .kv
        .set(ns, &key, &serialize_record(&record)?)
        .await
        .map_err(|e| stage_failed(progress, "Failed to save resume data", e))?;
    progress.status("Analysis complete, redirecting...");
    info!("Resume {id} analyzed for {}", ns.as_str());

    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::retry::doubles::ScriptedProvider;
    use crate::llm_client::ChatResponse;
    use crate::models::feedback::fixtures::sample_feedback;
    use crate::raster::doubles::{FixedRasterizer, FAKE_PNG};
    use crate::storage::{KvItem, KvStore, StoreError};

    /// A key-value store that accepts reads but rejects every write.
    struct ReadOnlyKv;

    #[async_trait]
    impl KvStore for ReadOnlyKv {
        async fn get(&self, _ns: &Namespace, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _ns: &Namespace, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("READONLY replica".to_string()))
        }

        async fn set_if_absent(
            &self,
            _ns: &Namespace,
            _key: &str,
            _value: &str,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Backend("READONLY replica".to_string()))
        }

        async fn delete(&self, _ns: &Namespace, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("READONLY replica".to_string()))
        }

        async fn list(
            &self,
            _ns: &Namespace,
            _pattern: &str,
            _include_values: bool,
        ) -> Result<Vec<KvItem>, StoreError> {
            Ok(Vec::new())
        }

        async fn flush(&self, _ns: &Namespace) -> Result<(), StoreError> {
            Err(StoreError::Backend("READONLY replica".to_string()))
        }
    }

    fn upload() -> UploadRequest {
        UploadRequest {
            company_name: "Acme".to_string(),
            job_title: "Platform Engineer".to_string(),
            job_description: "Rust and Kubernetes".to_string(),
            file_name: "My CV.pdf".to_string(),
            pdf: Bytes::from_static(b"%PDF-1.7 test"),
        }
    }

    fn fenced_feedback() -> ChatResponse {
        let json = serde_json::to_string_pretty(&sample_feedback()).unwrap();
        ChatResponse::from_text(format!("```json\n{json}\n```"))
    }

    async fn stored_records(state: &AppState, ns: &Namespace) -> Vec<ResumeRecord> {
        state
            .kv
            .list(ns, &ResumeRecord::list_pattern(), true)
            .await
            .unwrap()
            .into_iter()
            .map(|item| serde_json::from_str(&item.value.unwrap()).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_analysis_persists_feedback() {
        let state = AppState::for_tests(
            Arc::new(ScriptedProvider::new(vec![Ok(fenced_feedback())])),
            Arc::new(FixedRasterizer { fail: false }),
        );
        let ns = Namespace::user("alice");
        let mut progress = Progress::default();

        let record = analyze_upload(&state, &ns, upload(), &mut progress)
            .await
            .unwrap();

        assert_eq!(record.feedback, Some(sample_feedback()));
        assert!(record.resume_path.starts_with("My_CV-"));
        assert!(record.resume_path.ends_with(".pdf"));
        assert!(record.image_path.ends_with(".png"));
        assert_eq!(
            state.files.read(&ns, &record.image_path).await.unwrap(),
            Bytes::from_static(FAKE_PNG)
        );
        assert_eq!(stored_records(&state, &ns).await, vec![record]);
        assert_eq!(
            progress.lines(),
            [
                "Uploading the file...",
                "Converting to image...",
                "Uploading the image...",
                "Preparing data...",
                "Analyzing...",
                "Analysis complete, redirecting...",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_leave_placeholder() {
        let provider = Arc::new(ScriptedProvider::new(ScriptedProvider::failing(2)));
        let state = AppState::for_tests(provider.clone(), Arc::new(FixedRasterizer { fail: false }));
        let ns = Namespace::user("alice");
        let mut progress = Progress::default();

        let err = analyze_upload(&state, &ns, upload(), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Analysis { ref reason, .. }
                if reason == "Failed to analyze resume after multiple attempts"
        ));
        assert_eq!(provider.calls(), 2);
        let records = stored_records(&state, &ns).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].feedback.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_fails_parse_stage() {
        let state = AppState::for_tests(
            Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::from_text(
                "I cannot review this document.",
            ))])),
            Arc::new(FixedRasterizer { fail: false }),
        );
        let ns = Namespace::user("alice");
        let mut progress = Progress::default();

        let err = analyze_upload(&state, &ns, upload(), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Analysis { ref reason, .. }
                if reason == "Failed to parse analysis results"
        ));
        assert!(stored_records(&state, &ns).await[0].feedback.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversion_failure_stops_before_record() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(fenced_feedback())]));
        let state = AppState::for_tests(provider.clone(), Arc::new(FixedRasterizer { fail: true }));
        let ns = Namespace::user("alice");
        let mut progress = Progress::default();

        let err = analyze_upload(&state, &ns, upload(), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Analysis { ref reason, .. }
                if reason == "Failed to convert PDF to image"
        ));
        assert_eq!(provider.calls(), 0);
        assert!(stored_records(&state, &ns).await.is_empty());
        // The raw PDF upload already happened and is not rolled back.
        assert_eq!(state.files.read_dir(&ns, "./").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_write_failure_is_a_pipeline_stage() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(fenced_feedback())]));
        let mut state =
            AppState::for_tests(provider.clone(), Arc::new(FixedRasterizer { fail: false }));
        state.kv = Arc::new(ReadOnlyKv);
        let ns = Namespace::user("alice");
        let mut progress = Progress::default();

        let err = analyze_upload(&state, &ns, upload(), &mut progress)
            .await
            .unwrap_err();

        let AppError::Analysis { reason, status_log } = err else {
            panic!("expected an analysis failure");
        };
        assert_eq!(reason, "Failed to save resume data");
        assert_eq!(
            status_log.last().map(String::as_str),
            Some("Error: Failed to save resume data. Please try again.")
        );
        assert!(status_log.contains(&"Preparing data...".to_string()));
        assert_eq!(provider.calls(), 0);
        assert_eq!(progress.lines(), status_log.as_slice());
    }
}
