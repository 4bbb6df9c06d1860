use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::extract::ValidJson;
use super::AppState;
use crate::error::{AppError, ErrorBody};
use crate::models::{Caller, Deliverable};
use crate::service::deliverables::{self, CreateDeliverable, UpdateDeliverable};

#[derive(Serialize, ToSchema)]
pub struct DeletedDeliverable {
    pub message: String,
    pub deliverable: Deliverable,
}

#[utoipa::path(
    post, path = "/api/deliverables/add", tag = "deliverables",
    request_body = CreateDeliverable,
    responses(
        (status = 201, body = Deliverable),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<CreateDeliverable>,
) -> Result<(StatusCode, Json<Deliverable>), AppError> {
    let deliverable = deliverables::create(&state.storage, &caller, body)?;
    Ok((StatusCode::CREATED, Json(deliverable)))
}

#[utoipa::path(
    get, path = "/api/deliverables/all/{project_id}", tag = "deliverables",
    params(("project_id" = String, Path, description = "Project id")),
    responses(
        (status = 200, body = Vec<Deliverable>),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<Deliverable>>, AppError> {
    Ok(Json(deliverables::list(&state.storage, &caller, &project_id)?))
}

#[utoipa::path(
    patch, path = "/api/deliverables/{id}", tag = "deliverables",
    params(("id" = String, Path, description = "Deliverable id")),
    request_body = UpdateDeliverable,
    responses(
        (status = 200, body = Deliverable),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateDeliverable>,
) -> Result<Json<Deliverable>, AppError> {
    Ok(Json(deliverables::update(&state.storage, &caller, &id, body)?))
}

#[utoipa::path(
    delete, path = "/api/deliverables/{id}", tag = "deliverables",
    params(("id" = String, Path, description = "Deliverable id")),
    responses(
        (status = 200, body = DeletedDeliverable),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<DeletedDeliverable>, AppError> {
    let deliverable = deliverables::delete(&state.storage, &caller, &id)?;
    Ok(Json(DeletedDeliverable {
        message: "Deliverable deleted".to_string(),
        deliverable,
    }))
}
