use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::analysis::pipeline::{analyze_upload, UploadRequest};
use crate::analysis::Progress;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub id: String,
    pub redirect: String,
    pub status_log: Vec<String>,
}

#[derive(Debug, Default)]
struct UploadForm {
    company_name: String,
    job_title: String,
    job_description: String,
    file: Option<(String, Bytes)>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Malformed upload form: {e}"))
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "company-name" => form.company_name = field.text().await.map_err(bad_form)?,
            "job-title" => form.job_title = field.text().await.map_err(bad_form)?,
            "job-description" => form.job_description = field.text().await.map_err(bad_form)?,
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                if !bytes.is_empty() {
                    form.file = Some((file_name, bytes));
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Checks the payload before anything is stored.
fn validate_pdf(bytes: &[u8], max_bytes: usize) -> Result<(), AppError> {
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File is larger than the {} MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation("Only PDF files are accepted".to_string()));
    }
    Ok(())
}

/// POST /api/v1/resumes
/// Multipart form: `company-name`, `job-title`, `job-description`, `file`.
pub async fn handle_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AnalysisResponse>), AppError> {
    let form = read_form(multipart).await?;
    let (file_name, pdf) = form
        .file
        .ok_or_else(|| AppError::Validation("A PDF file is required".to_string()))?;
    validate_pdf(&pdf, state.config.max_upload_bytes)?;

    let request = UploadRequest {
        company_name: form.company_name.trim().to_string(),
        job_title: form.job_title.trim().to_string(),
        job_description: form.job_description.trim().to_string(),
        file_name,
        pdf,
    };

    let mut progress = Progress::default();
    let record = analyze_upload(&state, &auth.namespace(), request, &mut progress).await?;

    Ok((
        StatusCode::CREATED,
        Json(AnalysisResponse {
            redirect: format!("/resume/{}", record.id),
            id: record.id,
            status_log: progress.into_lines(),
        }),
    ))
}
