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
use crate::models::{Caller, Project, ProjectDetail, ProjectSummary};
use crate::service::projects::{self, CreateProject, UpdateProject};

#[derive(Serialize, ToSchema)]
pub struct DeletedProject {
    pub message: String,
    pub project: Project,
}

#[utoipa::path(
    post, path = "/api/projects/add", tag = "projects",
    request_body = CreateProject,
    responses(
        (status = 201, body = Project),
        (status = 400, body = ErrorBody),
        (status = 403, description = "Caller is not a PM", body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<CreateProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = projects::create(&state.storage, &caller, body)?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get, path = "/api/projects/all", tag = "projects",
    responses((status = 200, body = Vec<ProjectSummary>)),
    security(("bearer" = []))
)]
pub async fn all(
    State(state): State<Arc<AppState>>,
    Extension(_caller): Extension<Caller>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    Ok(Json(projects::all(&state.storage)?))
}

#[utoipa::path(
    get, path = "/api/projects/{id}", tag = "projects",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, body = ProjectDetail),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetail>, AppError> {
    Ok(Json(projects::detail(&state.storage, &caller, &id)?))
}

#[utoipa::path(
    patch, path = "/api/projects/{id}", tag = "projects",
    params(("id" = String, Path, description = "Project id")),
    request_body = UpdateProject,
    responses(
        (status = 200, body = Project),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateProject>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(projects::update(&state.storage, &caller, &id, body)?))
}

#[utoipa::path(
    delete, path = "/api/projects/{id}", tag = "projects",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, body = DeletedProject),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<DeletedProject>, AppError> {
    let project = projects::delete(&state.storage, &caller, &id)?;
    Ok(Json(DeletedProject {
        message: "Project deleted".to_string(),
        project,
    }))
}
