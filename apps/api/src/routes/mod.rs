pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::detail;
use crate::listing;
use crate::state::AppState;
use crate::wipe;

/// Room for the text fields and multipart framing on top of the PDF itself.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/sign-in", post(auth::handle_sign_in))
        .route("/api/v1/auth/sign-out", post(auth::handle_sign_out))
        .route("/api/v1/auth/session", get(auth::handle_session))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(listing::handle_list_resumes).post(analysis::handle_upload),
        )
        .route("/api/v1/resumes/:id", get(detail::handle_get_resume))
        .route("/api/v1/resumes/:id/pdf", get(detail::handle_get_pdf))
        .route("/api/v1/resumes/:id/image", get(detail::handle_get_image))
        .route(
            "/api/v1/resumes/:id/image/download",
            get(detail::handle_download_image),
        )
        .route(
            "/api/v1/resumes/:id/report",
            get(detail::handle_download_report),
        )
        .route(
            "/api/v1/resumes/:id/report/print",
            get(detail::handle_print_report),
        )
        // Wipe
        .route(
            "/api/v1/wipe",
            get(wipe::handle_wipe_overview).post(wipe::handle_wipe),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::retry::doubles::ScriptedProvider;
    use crate::llm_client::ChatResponse;
    use crate::models::feedback::fixtures::sample_feedback;
    use crate::raster::doubles::FixedRasterizer;

    const BOUNDARY: &str = "resumerx-test-boundary";

    fn test_state(script: Vec<Result<ChatResponse, crate::llm_client::LlmError>>) -> AppState {
        AppState::for_tests(
            Arc::new(ScriptedProvider::new(script)),
            Arc::new(FixedRasterizer { fail: false }),
        )
    }

    fn feedback_reply() -> ChatResponse {
        ChatResponse::from_text(serde_json::to_string(&sample_feedback()).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn authed_get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(token: &str, file: Option<&[u8]>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in [
            ("company-name", "Acme"),
            ("job-title", "Platform Engineer"),
            ("job-description", "Rust"),
        ] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(file) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(file);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/resumes")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn sign_in_request(body: Value) -> Request<Body> {
        json_request(Method::POST, "/api/v1/auth/sign-in", None, body)
    }

    async fn sign_in(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            sign_in_request(json!({
                "username": username,
                "password": "correct horse",
                "next": "/resume/7",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirect"], "/resume/7");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(vec![]));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "resumerx-api");
    }

    #[tokio::test]
    async fn test_protected_route_without_session_points_at_sign_in() {
        let app = build_router(test_state(vec![]));
        let request = Request::builder()
            .uri("/api/v1/resumes/42")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("/auth?next=/resume/42"));
    }

    #[tokio::test]
    async fn test_empty_listing_shows_empty_state() {
        let app = build_router(test_state(vec![]));
        let token = sign_in(&app, "alice").await;

        let (status, body) = send(&app, authed_get("/api/v1/resumes?wiped=true", &token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cards"], json!([]));
        assert_eq!(
            body["empty_state"]["message"],
            "No resumes found. Upload your first resume to get feedback."
        );
        assert_eq!(body["empty_state"]["upload_route"], "/upload");
        assert_eq!(body["notice"], "All your data has been cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_then_view_detail_and_report() {
        let app = build_router(test_state(vec![Ok(feedback_reply())]));
        let token = sign_in(&app, "alice").await;

        let (status, body) = send(&app, upload_request(&token, Some(b"%PDF-1.7 cv"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(body["redirect"], format!("/resume/{id}"));

        let (status, body) = send(&app, authed_get("/api/v1/resumes", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cards"][0]["id"], id.as_str());
        assert_eq!(body["cards"][0]["overall_score"], 78);
        assert!(body.get("empty_state").is_none());
        assert!(body.get("notice").is_none());

        let (status, body) = send(&app, authed_get(&format!("/api/v1/resumes/{id}"), &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feedback_ready"], true);
        assert_eq!(body["breakdown"]["overall_score"], 78);
        assert_eq!(body["breakdown"]["categories"][0]["name"], "Tone & Style");

        let response = app
            .clone()
            .oneshot(authed_get(&format!("/api/v1/resumes/{id}/report"), &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"Resume_Analysis_Report_"));
    }

    #[tokio::test]
    async fn test_upload_without_file_has_no_side_effects() {
        let state = test_state(vec![Ok(feedback_reply())]);
        let app = build_router(state.clone());
        let token = sign_in(&app, "alice").await;

        let (status, _) = send(&app, upload_request(&token, None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let ns = crate::storage::Namespace::user("alice");
        assert!(state.files.read_dir(&ns, "./").await.unwrap().is_empty());
        assert!(state.kv.list(&ns, "*", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let app = build_router(test_state(vec![]));
        let token = sign_in(&app, "alice").await;
        let (status, _) = send(&app, upload_request(&token, Some(b"GIF89a"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_resume_is_404() {
        let app = build_router(test_state(vec![]));
        let token = sign_in(&app, "alice").await;
        let (status, _) = send(&app, authed_get("/api/v1/resumes/nope", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wipe_confirms_then_signs_out() {
        let app = build_router(test_state(vec![]));
        let token = sign_in(&app, "alice").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/wipe",
                Some(&token),
                json!({ "scope": "data-and-logout" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "confirm");
        assert_eq!(body["warning"], "This will delete ALL your data and log you out!");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/wipe",
                Some(&token),
                json!({ "scope": "data-and-logout", "confirm": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "done");
        assert_eq!(body["redirect"], "/");

        let (status, _) = send(&app, authed_get("/api/v1/resumes", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_analysis_returns_status_log() {
        let app = build_router(test_state(ScriptedProvider::failing(2)));
        let token = sign_in(&app, "alice").await;

        let (status, body) = send(&app, upload_request(&token, Some(b"%PDF-1.7 cv"))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"]["message"],
            "Error: Failed to analyze resume after multiple attempts. Please try again."
        );
        let log: Vec<_> = body["error"]["status_log"]
            .as_array()
            .unwrap()
            .iter()
            .map(|line| line.as_str().unwrap())
            .collect();
        assert_eq!(
            log[..5],
            [
                "Uploading the file...",
                "Converting to image...",
                "Uploading the image...",
                "Preparing data...",
                "Analyzing...",
            ]
        );
        assert!(log.contains(&"Analysis failed, retrying... (1/2)"));
        assert_eq!(
            log.last().copied(),
            Some("Error: Failed to analyze resume after multiple attempts. Please try again.")
        );
    }

    #[tokio::test]
    async fn test_existing_username_needs_its_password() {
        let app = build_router(test_state(vec![]));
        sign_in(&app, "alice").await;

        let (status, body) = send(&app, sign_in_request(json!({ "username": "alice" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("token").is_none());

        let (status, body) = send(
            &app,
            sign_in_request(json!({ "username": "alice", "password": "guessed wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("token").is_none());

        // The original password still works and reaches the same namespace.
        let token = sign_in(&app, "alice").await;
        let (status, _) = send(&app, authed_get("/api/v1/resumes", &token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_access_code_is_enforced_when_configured() {
        let mut state = test_state(vec![]);
        state.config.access_code = Some("letmein".to_string());
        let app = build_router(state);

        let (status, _) = send(
            &app,
            sign_in_request(json!({
                "username": "alice",
                "password": "correct horse",
                "access_code": "nope",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            sign_in_request(json!({
                "username": "alice",
                "password": "correct horse",
                "access_code": "letmein",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
