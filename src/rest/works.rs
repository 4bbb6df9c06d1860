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
use crate::models::{Caller, Work, WorkView};
use crate::service::works::{self, CreateWork, UpdateWork};

#[derive(Serialize, ToSchema)]
pub struct DeletedWork {
    pub message: String,
    pub work: Work,
}

#[utoipa::path(
    post, path = "/api/works/add", tag = "works",
    request_body = CreateWork,
    responses(
        (status = 201, body = Work),
        (status = 400, body = ErrorBody),
        (status = 403, description = "Not assigned to planning", body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<CreateWork>,
) -> Result<(StatusCode, Json<Work>), AppError> {
    let work = works::create(&state.storage, &caller, body)?;
    Ok((StatusCode::CREATED, Json(work)))
}

#[utoipa::path(
    get, path = "/api/works/all/{project_id}", tag = "works",
    params(("project_id" = String, Path, description = "Project id")),
    responses(
        (status = 200, body = Vec<WorkView>),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<WorkView>>, AppError> {
    Ok(Json(works::list(&state.storage, &caller, &project_id)?))
}

#[utoipa::path(
    patch, path = "/api/works/{id}", tag = "works",
    params(("id" = String, Path, description = "Work id")),
    request_body = UpdateWork,
    responses(
        (status = 200, body = Work),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateWork>,
) -> Result<Json<Work>, AppError> {
    Ok(Json(works::update(&state.storage, &caller, &id, body)?))
}

#[utoipa::path(
    delete, path = "/api/works/{id}", tag = "works",
    params(("id" = String, Path, description = "Work id")),
    responses(
        (status = 200, body = DeletedWork),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<DeletedWork>, AppError> {
    let work = works::delete(&state.storage, &caller, &id)?;
    Ok(Json(DeletedWork {
        message: "Work deleted".to_string(),
        work,
    }))
}
