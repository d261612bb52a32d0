//! Home listing: the signed-in user's résumé cards.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::state::AppState;
use crate::storage::KvItem;

pub const EMPTY_STATE: &str = "No resumes found. Upload your first resume to get feedback.";
pub const WIPED_NOTICE: &str = "All your data has been cleared";

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub wiped: bool,
}

#[derive(Debug, Serialize)]
pub struct ResumeCard {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub job_title: String,
    /// `None` while analysis is pending.
    pub overall_score: Option<u32>,
    pub image_url: String,
    pub detail_route: String,
}

impl From<&ResumeRecord> for ResumeCard {
    fn from(record: &ResumeRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.display_title().to_string(),
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            overall_score: record.feedback.as_ref().map(|f| f.overall_score),
            image_url: format!("/api/v1/resumes/{}/image", record.id),
            detail_route: format!("/resume/{}", record.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmptyState {
    pub message: &'static str,
    pub upload_route: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub cards: Vec<ResumeCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Decodes listed records in store order, skipping any that fail to parse.
pub fn decode_records(items: Vec<KvItem>) -> Vec<ResumeRecord> {
    items
        .into_iter()
        .filter_map(|item| {
            let raw = item.value?;
            match serde_json::from_str::<ResumeRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed record {}: {e}", item.key);
                    None
                }
            }
        })
        .collect()
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListingQuery>,
) -> Result<Json<ListingResponse>, AppError> {
    let items = state
        .kv
        .list(&auth.namespace(), &ResumeRecord::list_pattern(), true)
        .await?;
    let cards: Vec<ResumeCard> = decode_records(items).iter().map(ResumeCard::from).collect();

    Ok(Json(ListingResponse {
        empty_state: cards.is_empty().then_some(EmptyState {
            message: EMPTY_STATE,
            upload_route: "/upload",
        }),
        notice: query.wiped.then_some(WIPED_NOTICE),
        cards,
    }))
}
