//! Data wipe: deletes every stored file in the user's root, then flushes the
//! user's key-value namespace, optionally ending the session.
//!
//! Deletion is sequential and stops at the first failure; in that case the
//! key-value store is left untouched.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::{end_session, AuthUser};
use crate::errors::AppError;
use crate::models::fs::FsItem;
use crate::models::user::User;
use crate::state::AppState;
use crate::storage::{FileStore, KvStore, Namespace, StoreError};

const ROOT_DIR: &str = "./";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WipeScope {
    DataOnly,
    DataAndLogout,
}

impl WipeScope {
    pub const ALL: [WipeScope; 2] = [WipeScope::DataOnly, WipeScope::DataAndLogout];

    pub fn warning(self) -> &'static str {
        match self {
            WipeScope::DataOnly => "This will delete ALL your data!",
            WipeScope::DataAndLogout => "This will delete ALL your data and log you out!",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WipeOverview {
    pub user: User,
    pub files: Vec<FsItem>,
    pub count: usize,
    pub scopes: [WipeScope; 2],
}

#[derive(Debug, Deserialize)]
pub struct WipeRequest {
    pub scope: WipeScope,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum WipeResponse {
    /// Second confirmation step; nothing has been deleted yet.
    Confirm {
        scope: WipeScope,
        warning: &'static str,
        count: usize,
    },
    Done {
        deleted: usize,
        redirect: &'static str,
        signed_out: bool,
    },
}

/// Deletes `items` one at a time, then flushes the namespace.
/// Returns the number of items deleted.
pub async fn wipe_data_only(
    files: &dyn FileStore,
    kv: &dyn KvStore,
    ns: &Namespace,
    items: &[FsItem],
) -> Result<usize, StoreError> {
    for item in items {
        if let Err(e) = files.delete(ns, &item.path).await {
            error!("Wipe of {} aborted at {}: {e}", ns.as_str(), item.path);
            return Err(e);
        }
    }
    kv.flush(ns).await?;
    info!("Wiped {} item(s) and flushed {}", items.len(), ns.as_str());
    Ok(items.len())
}

/// `wipe_data_only`, then ends the session behind `token`.
pub async fn wipe_and_sign_out(
    files: &dyn FileStore,
    kv: &dyn KvStore,
    ns: &Namespace,
    items: &[FsItem],
    token: &str,
) -> Result<usize, StoreError> {
    let deleted = wipe_data_only(files, kv, ns, items).await?;
    end_session(kv, token).await?;
    Ok(deleted)
}

/// GET /api/v1/wipe
pub async fn handle_wipe_overview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<WipeOverview>, AppError> {
    let files = state.files.read_dir(&auth.namespace(), ROOT_DIR).await?;
    Ok(Json(WipeOverview {
        user: auth.user,
        count: files.len(),
        files,
        scopes: WipeScope::ALL,
    }))
}

/// POST /api/v1/wipe
pub async fn handle_wipe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<WipeRequest>,
) -> Result<Json<WipeResponse>, AppError> {
    let ns = auth.namespace();
    let items = state.files.read_dir(&ns, ROOT_DIR).await?;

    if !req.confirm {
        return Ok(Json(WipeResponse::Confirm {
            scope: req.scope,
            warning: req.scope.warning(),
            count: items.len(),
        }));
    }

    let files = state.files.as_ref();
    let kv = state.kv.as_ref();
    let response = match req.scope {
        WipeScope::DataOnly => WipeResponse::Done {
            deleted: wipe_data_only(files, kv, &ns, &items).await?,
            redirect: "/?wiped=true",
            signed_out: false,
        },
        WipeScope::DataAndLogout => WipeResponse::Done {
            deleted: wipe_and_sign_out(files, kv, &ns, &items, &auth.token).await?,
            redirect: "/",
            signed_out: true,
        },
    };
    Ok(Json(response))
}
