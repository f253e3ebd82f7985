//! Case filing, listing, routing and resolution

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{ApiResult, Caller};
use crate::api::error::ApiError;
use crate::assignment::BulkItemResult;
use crate::models::{Case, CaseFilter, CaseKind, CaseRef, CaseStatus};
use crate::portal::Portal;
use crate::store::{NewCase, Transition};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    kind: Option<CaseKind>,
    status: Option<CaseStatus>,
    requester_id: Option<String>,
    officer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    officer_id: String,
    #[serde(default)]
    expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignBody {
    case_ids: Vec<u64>,
    officer_id: String,
    #[serde(default)]
    atomic: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    expected_version: Option<u64>,
}

pub async fn create(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Json(new): Json<NewCase>,
) -> Result<(StatusCode, Json<Case>), ApiError> {
    let case = portal.create_case(&actor, new)?;
    Ok((StatusCode::CREATED, Json(case)))
}

pub async fn list(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Case>> {
    let filter = CaseFilter {
        kind: query.kind,
        status: query.status,
        requester_id: query.requester_id,
        officer_id: query.officer_id,
    };
    Ok(Json(portal.list_cases(&actor, &filter)?))
}

pub async fn get(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
) -> ApiResult<Case> {
    Ok(Json(portal.get_case(&actor, CaseRef::new(kind, id))?))
}

pub async fn assign(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
    Json(body): Json<AssignBody>,
) -> ApiResult<Case> {
    let case = portal.assign(
        &actor,
        CaseRef::new(kind, id),
        &body.officer_id,
        body.expected_version,
    )?;
    Ok(Json(case))
}

pub async fn assign_bulk(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path(kind): Path<CaseKind>,
    Json(body): Json<BulkAssignBody>,
) -> ApiResult<Vec<BulkItemResult>> {
    let results =
        portal.assign_bulk(&actor, kind, &body.case_ids, &body.officer_id, body.atomic)?;
    Ok(Json(results))
}

pub async fn complete(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
    body: Option<Json<ResolveBody>>,
) -> ApiResult<Transition> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let done = portal.complete(
        &actor,
        CaseRef::new(kind, id),
        body.note,
        body.expected_version,
    )?;
    Ok(Json(done))
}

pub async fn reject(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
    Json(body): Json<ResolveBody>,
) -> ApiResult<Transition> {
    let note = body.note.unwrap_or_default();
    let rejected = portal.reject(
        &actor,
        CaseRef::new(kind, id),
        &note,
        body.expected_version,
    )?;
    Ok(Json(rejected))
}
