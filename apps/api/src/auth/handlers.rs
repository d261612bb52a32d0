use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    authenticate, create_session, end_session, nav_links, safe_redirect, validate_username,
    AuthUser, NavLink,
};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    /// Where the client should go once signed in.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: User,
    pub redirect: String,
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub redirect: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub nav: Vec<NavLink>,
}

/// POST /api/v1/auth/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    let username = req.username.trim();
    validate_username(username)?;
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("A password is required".to_string()))?;

    if let Some(expected) = state.config.access_code.as_deref() {
        if req.access_code.as_deref() != Some(expected) {
            warn!("Rejected sign-in for {username}: bad access code");
            return Err(AppError::unauthorized(&safe_redirect(req.next.as_deref())));
        }
    }

    if !authenticate(state.kv.as_ref(), username, password).await? {
        warn!("Rejected sign-in for {username}: bad password");
        return Err(AppError::unauthorized(&safe_redirect(req.next.as_deref())));
    }

    let token = create_session(state.kv.as_ref(), username).await?;
    info!("User {username} signed in");

    Ok(Json(SignInResponse {
        token,
        user: User {
            username: username.to_string(),
        },
        redirect: safe_redirect(req.next.as_deref()),
    }))
}

/// POST /api/v1/auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SignOutResponse>, AppError> {
    end_session(state.kv.as_ref(), &auth.token).await?;
    info!("User {} signed out", auth.user.username);
    Ok(Json(SignOutResponse {
        redirect: "/".to_string(),
    }))
}

/// GET /api/v1/auth/session
pub async fn handle_session(auth: Option<AuthUser>) -> Json<SessionResponse> {
    let user = auth.map(|a| a.user);
    Json(SessionResponse {
        is_authenticated: user.is_some(),
        nav: nav_links(user.is_some()),
        user,
    })
}
