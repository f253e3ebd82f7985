//! Attachment upload

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};

use super::Caller;
use crate::api::error::ApiError;
use crate::error::PortalError;
use crate::files::Upload;
use crate::models::Attachment;
use crate::portal::Portal;

pub const FILE_NAME_HEADER: &str = "x-file-name";

pub async fn upload(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Attachment>), ApiError> {
    let name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| PortalError::validation("x-file-name header is required"))?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let attachment = portal
        .upload(
            &actor,
            Upload {
                name,
                content_type,
                bytes: body.to_vec(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}
