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
use crate::models::{Activity, ActivityView, Caller};
use crate::service::activities::{self, CreateActivity, UpdateActivity};

#[derive(Serialize, ToSchema)]
pub struct ActivityEnvelope {
    pub activity: Activity,
}

#[derive(Serialize, ToSchema)]
pub struct ActivitiesEnvelope {
    pub activities: Vec<ActivityView>,
}

#[utoipa::path(
    post, path = "/api/activities", tag = "activities",
    request_body = CreateActivity,
    responses(
        (status = 201, body = ActivityEnvelope),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<CreateActivity>,
) -> Result<(StatusCode, Json<ActivityEnvelope>), AppError> {
    let activity = activities::create(&state.storage, &caller, body)?;
    Ok((StatusCode::CREATED, Json(ActivityEnvelope { activity })))
}

/// The path segment is the project id for this listing.
#[utoipa::path(
    get, path = "/api/activities/{id}", tag = "activities",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, body = ActivitiesEnvelope),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(project_id): Path<String>,
) -> Result<Json<ActivitiesEnvelope>, AppError> {
    let activities = activities::list(&state.storage, &caller, &project_id)?;
    Ok(Json(ActivitiesEnvelope { activities }))
}

#[utoipa::path(
    patch, path = "/api/activities/{id}", tag = "activities",
    params(("id" = String, Path, description = "Activity id")),
    request_body = UpdateActivity,
    responses(
        (status = 200, body = ActivityEnvelope),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateActivity>,
) -> Result<Json<ActivityEnvelope>, AppError> {
    let activity = activities::update(&state.storage, &caller, &id, body)?;
    Ok(Json(ActivityEnvelope { activity }))
}

#[utoipa::path(
    delete, path = "/api/activities/{id}", tag = "activities",
    params(("id" = String, Path, description = "Activity id")),
    responses(
        (status = 200, body = ActivityEnvelope),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<ActivityEnvelope>, AppError> {
    let activity = activities::delete(&state.storage, &caller, &id)?;
    Ok(Json(ActivityEnvelope { activity }))
}
