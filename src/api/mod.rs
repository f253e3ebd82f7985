//! HTTP surface over [`Portal`]
//!
//! JSON in and out. Every `/v1` route resolves the caller from the
//! `Authorization: Bearer` header before the handler runs.

mod cases;
mod chat;
pub mod error;
mod files;
mod officers;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::parse_bearer;
use crate::error::PortalError;
use crate::models::Actor;
use crate::portal::Portal;
use error::ApiError;

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// The authenticated caller of a request.
pub struct Caller(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<Portal>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        portal: &Arc<Portal>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let bearer = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| ApiError(PortalError::InvalidCredential))?;
                Some(parse_bearer(value).ok_or(ApiError(PortalError::InvalidCredential))?)
            }
        };
        Ok(Caller(portal.authenticate(bearer)?))
    }
}

pub fn router(portal: Arc<Portal>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/cases", post(cases::create).get(cases::list))
        .route("/v1/cases/:kind/assign-bulk", post(cases::assign_bulk))
        .route("/v1/cases/:kind/:id", get(cases::get))
        .route("/v1/cases/:kind/:id/assign", post(cases::assign))
        .route("/v1/cases/:kind/:id/complete", post(cases::complete))
        .route("/v1/cases/:kind/:id/reject", post(cases::reject))
        .route(
            "/v1/cases/:kind/:id/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        .route("/v1/cases/:kind/:id/read", post(chat::mark_read))
        .route("/v1/cases/:kind/:id/session", get(chat::session))
        .route("/v1/cases/:kind/:id/session/end", post(chat::end_session))
        .route("/v1/cases/:kind/:id/session/resume", post(chat::resume_session))
        .route("/v1/files", post(files::upload))
        .route("/v1/officers", get(officers::list))
        .route("/v1/unread-count", get(officers::unread_count))
        .with_state(portal)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    portal: Arc<Portal>,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(portal))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}


#[cfg(test)]
mod tests {
    use super::test_support::spawn;

    #[tokio::test]
    async fn test_healthz_needs_no_credential() {
        let server = spawn().await;
        let resp = server.http.get(server.url("/healthz")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_missing_and_bad_credentials() {
        let server = spawn().await;

        let resp = server.http.get(server.url("/v1/cases")).send().await.unwrap();
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

        let resp = server
            .http
            .get(server.url("/v1/cases"))
            .bearer_auth("nope")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIAL");

        let resp = server
            .http
            .get(server.url("/v1/cases"))
            .header("authorization", "Basic abc")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }
}
