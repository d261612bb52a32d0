// Authentication gate.
// A username is claimed by its first sign-in, which stores a password hash in
// the accounts namespace; later sign-ins must present the same password.
// Sessions are opaque bearer tokens stored in the sessions namespace; every
// protected handler takes an `AuthUser`, which resolves the token or rejects
// with 401 and the sign-in route to follow.

pub mod handlers;
pub mod password;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{Account, Session, User};
use crate::state::AppState;
use crate::storage::{KvStore, Namespace, StoreError};

const MAX_USERNAME_LEN: usize = 64;

/// A signed-in user, resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn namespace(&self) -> Namespace {
        Namespace::user(&self.user.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
}

pub fn nav_links(signed_in: bool) -> Vec<NavLink> {
    if signed_in {
        vec![
            NavLink { label: "Home", href: "/" },
            NavLink { label: "Upload Resume", href: "/upload" },
            NavLink { label: "Wipe Data", href: "/wipe" },
            NavLink { label: "Log Out", href: "/logout" },
        ]
    } else {
        vec![NavLink { label: "Log In", href: "/auth" }]
    }
}

/// Usernames double as namespace names, so they are kept to a safe alphabet.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && !username.starts_with('.')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Username must be 1-{MAX_USERNAME_LEN} characters of letters, digits, '.', '_' or '-'"
        )))
    }
}

/// Only same-site absolute paths are followed; anything else lands on `/`.
pub fn safe_redirect(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

/// Maps an API path to the page a signed-in user would return to.
pub fn client_route(api_path: &str) -> String {
    let rest = api_path.strip_prefix("/api/v1").unwrap_or(api_path);
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some("resumes"), Some(id)) => format!("/resume/{id}"),
        (Some("wipe"), _) => "/wipe".to_string(),
        _ => "/".to_string(),
    }
}

fn check_account(raw: &str, password: &str) -> Result<bool, AppError> {
    let account: Account = serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Unreadable account record: {e}")))?;
    Ok(password::verify(&account, password))
}

/// Verifies `password` for `username`, registering the account on first use.
/// Returns `false` when the username is taken and the password does not match.
pub async fn authenticate(
    kv: &dyn KvStore,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let accounts = Namespace::accounts();
    if let Some(raw) = kv.get(&accounts, username).await? {
        return check_account(&raw, password);
    }

    if password.chars().count() < password::MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            password::MIN_PASSWORD_LEN
        )));
    }
    let value = serde_json::to_string(&password::new_account(username, password))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize account: {e}")))?;
    if kv.set_if_absent(&accounts, username, &value).await? {
        info!("Registered account {username}");
        return Ok(true);
    }

    // Another sign-in claimed the name first; check against its password.
    let raw = kv
        .get(&accounts, username)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Account {username} vanished")))?;
    check_account(&raw, password)
}

pub async fn create_session(kv: &dyn KvStore, username: &str) -> Result<String, AppError> {
    let token = Uuid::new_v4().to_string();
    let session = Session {
        username: username.to_string(),
        created_at: Utc::now(),
    };
    let value = serde_json::to_string(&session)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize session: {e}")))?;
    kv.set(&Namespace::sessions(), &token, &value).await?;
    Ok(token)
}

/// Returns `None` for malformed, unknown or corrupt tokens.
pub async fn resolve_session(kv: &dyn KvStore, token: &str) -> Result<Option<User>, StoreError> {
    if Uuid::parse_str(token).is_err() {
        return Ok(None);
    }
    let Some(raw) = kv.get(&Namespace::sessions(), token).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<Session>(&raw) {
        Ok(session) => Ok(Some(User {
            username: session.username,
        })),
        Err(e) => {
            warn!("Discarding corrupt session record: {e}");
            Ok(None)
        }
    }
}

pub async fn end_session(kv: &dyn KvStore, token: &str) -> Result<(), StoreError> {
    kv.delete(&Namespace::sessions(), token).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || AppError::unauthorized(&client_route(parts.uri.path()));

        let token = bearer_token(&parts.headers).ok_or_else(unauthorized)?.to_string();
        match resolve_session(state.kv.as_ref(), &token).await? {
            Some(user) => {
                debug!("Request authenticated as {}", user.username);
                Ok(AuthUser { user, token })
            }
            None => Err(unauthorized()),
        }
    }
}
