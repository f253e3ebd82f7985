//! Officer directory and unread polling

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{ApiResult, Caller};
use crate::directory::OfficerPage;
use crate::portal::Portal;
use crate::unread::UnreadSummary;

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    search: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

pub async fn list(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<OfficerPage> {
    let page = portal.list_officers(
        &actor,
        query.search.as_deref(),
        query.page,
        query.page_size,
    )?;
    Ok(Json(page))
}

pub async fn unread_count(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
) -> ApiResult<UnreadSummary> {
    Ok(Json(portal.unread_count(&actor)?))
}
