//! Upload client for an external file service
//!
//! `POST {base_url}/files` with the raw bytes and an `x-file-name` header;
//! the service answers `{"url", "name", "size"}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{FileStore, Upload};
use crate::error::{PortalError, PortalResult};
use crate::models::Attachment;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
    name: Option<String>,
    size: Option<u64>,
}

pub struct HttpFileStore {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpFileStore {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> PortalResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortalError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn upload(&self, file: Upload) -> PortalResult<Attachment> {
        let url = format!("{}/files", self.base_url);
        tracing::debug!("File store POST {} ({} bytes)", url, file.bytes.len());

        let mut req = self
            .http
            .post(&url)
            .header("x-file-name", file.name.as_str())
            .header(
                reqwest::header::CONTENT_TYPE,
                file.content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream"),
            )
            .body(file.bytes);
        if let Some(ref token) = self.api_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| PortalError::Upstream(format!("POST {} failed: {}", url, e)))?;
        let resp = check_response(resp, &url).await?;
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| PortalError::Upstream(format!("bad upload response: {}", e)))?;

        Ok(Attachment {
            name: body.name.unwrap_or(file.name),
            url: body.url,
            size: body.size,
        })
    }
}

/// Turn a non-success status into `Upstream` with the response text.
async fn check_response(resp: reqwest::Response, url: &str) -> PortalResult<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PortalError::Upstream(format!(
            "HTTP {} for {}: {}",
            status.as_u16(),
            url,
            body
        )));
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn upload() -> Upload {
        Upload {
            name: "bukti.jpg".into(),
            content_type: Some("image/jpeg".into()),
            bytes: vec![0xff, 0xd8, 0xff],
        }
    }

    #[tokio::test]
    async fn test_upload_parses_response() {
        let app = Router::new().route(
            "/files",
            post(|headers: HeaderMap, body: axum::body::Bytes| async move {
                let name = headers
                    .get("x-file-name")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({
                    "url": format!("https://cdn.example/{}", name),
                    "size": body.len(),
                }))
            }),
        );
        let base = spawn(app).await;

        let store = HttpFileStore::new(&base, Some("t".into()), Duration::from_secs(5)).unwrap();
        let attachment = store.upload(upload()).await.unwrap();
        assert_eq!(attachment.url, "https://cdn.example/bukti.jpg");
        assert_eq!(attachment.name, "bukti.jpg");
        assert_eq!(attachment.size, Some(3));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_failure() {
        let app = Router::new().route(
            "/files",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = spawn(app).await;

        let store = HttpFileStore::new(&base, None, Duration::from_secs(5)).unwrap();
        match store.upload(upload()).await {
            Err(PortalError::Upstream(msg)) => assert!(msg.contains("503")),
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }
}
