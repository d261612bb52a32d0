//! Résumé detail view, stored file access, and report export.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::feedback::{AtsFeedback, Feedback, Tip};
use crate::models::resume::ResumeRecord;
use crate::report::{generate_report_html, image_file_name, report_file_name, ReportMode};
use crate::state::AppState;
use crate::storage::{KvStore, Namespace};

#[derive(Debug, Serialize)]
pub struct CategoryBreakdown {
    pub name: &'static str,
    pub score: u32,
    pub tips: Vec<Tip>,
}

#[derive(Debug, Serialize)]
pub struct ReportLinks {
    pub download: String,
    pub print: String,
}

/// Score breakdown in display order: overall, ATS, then the four categories.
#[derive(Debug, Serialize)]
pub struct Breakdown {
    pub overall_score: u32,
    pub ats: AtsFeedback,
    pub categories: Vec<CategoryBreakdown>,
    pub report: ReportLinks,
}

impl Breakdown {
    fn new(id: &str, feedback: &Feedback) -> Self {
        Self {
            overall_score: feedback.overall_score,
            ats: feedback.ats.clone(),
            categories: feedback
                .categories()
                .into_iter()
                .map(|(name, category)| CategoryBreakdown {
                    name,
                    score: category.score,
                    tips: category.tips.clone(),
                })
                .collect(),
            report: ReportLinks {
                download: format!("/api/v1/resumes/{id}/report"),
                print: format!("/api/v1/resumes/{id}/report/print"),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeDetail {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub pdf_url: String,
    pub image_url: String,
    pub feedback_ready: bool,
    /// Absent while the analysis is still pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

impl From<&ResumeRecord> for ResumeDetail {
    fn from(record: &ResumeRecord) -> Self {
        let id = &record.id;
        Self {
            id: id.clone(),
            title: record.display_title().to_string(),
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            job_description: record.job_description.clone(),
            pdf_url: format!("/api/v1/resumes/{id}/pdf"),
            image_url: format!("/api/v1/resumes/{id}/image"),
            feedback_ready: record.feedback.is_some(),
            breakdown: record.feedback.as_ref().map(|f| Breakdown::new(id, f)),
        }
    }
}

pub async fn load_record(kv: &dyn KvStore, ns: &Namespace, id: &str) -> Result<ResumeRecord, AppError> {
    let raw = kv
        .get(ns, &ResumeRecord::key(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Resume {id} is unreadable: {e}")))
}

fn ready_feedback(record: &ResumeRecord) -> Result<&Feedback, AppError> {
    record
        .feedback
        .as_ref()
        .ok_or_else(|| AppError::Conflict("Analysis is still in progress for this resume".into()))
}

fn attachment(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ResumeDetail>, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    Ok(Json(ResumeDetail::from(&record)))
}

async fn read_stored(state: &AppState, auth: &AuthUser, path: &str) -> Result<Bytes, AppError> {
    Ok(state.files.read(&auth.namespace(), path).await?)
}

/// GET /api/v1/resumes/:id/pdf
pub async fn handle_get_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    let bytes = read_stored(&state, &auth, &record.resume_path).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

/// GET /api/v1/resumes/:id/image
pub async fn handle_get_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    let bytes = read_stored(&state, &auth, &record.image_path).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

/// GET /api/v1/resumes/:id/image/download
pub async fn handle_download_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    let bytes = read_stored(&state, &auth, &record.image_path).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&image_file_name(today()))),
        ],
        bytes,
    ))
}

/// GET /api/v1/resumes/:id/report
pub async fn handle_download_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    let date = today();
    let html = generate_report_html(ready_feedback(&record)?, date, ReportMode::Download)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&report_file_name(date))),
        ],
        html,
    ))
}

/// GET /api/v1/resumes/:id/report/print
pub async fn handle_print_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(state.kv.as_ref(), &auth.namespace(), &id).await?;
    let html = generate_report_html(ready_feedback(&record)?, today(), ReportMode::Print)?;
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html))
}
