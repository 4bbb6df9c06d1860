use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::extract::ValidJson;
use super::AppState;
use crate::error::{AppError, ErrorBody};
use crate::models::{Caller, UserView};
use crate::service::users::{self, AddUser, LoginBody, RefreshBody, RegisterUser, Tokens, UpdateUser};

#[derive(Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserView,
}

#[derive(Serialize, ToSchema)]
pub struct UsersEnvelope {
    pub users: Vec<UserView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeletedUser {
    pub user: UserView,
    pub message: String,
}

fn envelope(user: &crate::models::User) -> Json<UserEnvelope> {
    Json(UserEnvelope { user: user.view() })
}

#[utoipa::path(
    post, path = "/api/users/add", tag = "users",
    request_body = AddUser,
    responses(
        (status = 200, body = UserEnvelope),
        (status = 403, body = ErrorBody),
        (status = 409, description = "Email in use", body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<AddUser>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = users::add(&state.storage, &state.config, &caller, body)?;
    Ok(envelope(&user))
}

#[utoipa::path(
    post, path = "/api/users/register", tag = "users",
    request_body = RegisterUser,
    responses(
        (status = 201, body = UserEnvelope),
        (status = 403, description = "Registration disabled", body = ErrorBody),
        (status = 409, body = ErrorBody),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<RegisterUser>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let user = users::register(&state.storage, &state.config, body)?;
    Ok((StatusCode::CREATED, envelope(&user)))
}

#[utoipa::path(
    post, path = "/api/users/login", tag = "users",
    request_body = LoginBody,
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, body = ErrorBody),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<LoginBody>,
) -> Result<Json<LoginResponse>, AppError> {
    let (user, pair) = users::login(&state.storage, &state.config, body)?;
    Ok(Json(LoginResponse {
        user: user.view(),
        token: pair.token,
        refresh_token: pair.refresh_token,
    }))
}

#[utoipa::path(
    get, path = "/api/users/logout", tag = "users",
    responses((status = 204), (status = 401, body = ErrorBody)),
    security(("bearer" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<StatusCode, AppError> {
    users::logout(&state.storage, &caller)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get, path = "/api/users/current", tag = "users",
    responses((status = 200, body = UserEnvelope), (status = 401, body = ErrorBody)),
    security(("bearer" = []))
)]
pub async fn current(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = users::current(&state.storage, &caller)?;
    Ok(envelope(&user))
}

#[utoipa::path(
    patch, path = "/api/users/update", tag = "users",
    request_body = UpdateUser,
    responses(
        (status = 200, body = UserEnvelope),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<UpdateUser>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = users::update_self(&state.storage, &state.config, &caller, body)?;
    Ok(envelope(&user))
}

/// Multipart upload; the image is read from the `avatar` field.
#[utoipa::path(
    patch, path = "/api/users/avatar", tag = "users",
    request_body(content = String, content_type = "multipart/form-data", description = "`avatar` image file"),
    responses((status = 200, body = UserEnvelope), (status = 400, body = ErrorBody)),
    security(("bearer" = []))
)]
pub async fn avatar(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> Result<Json<UserEnvelope>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let file_name = users::avatar_file_name(&caller, &original)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let dir = state.config.avatars_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Unexpected(format!("creating {}: {e}", dir.display())))?;
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(|e| AppError::Unexpected(format!("writing avatar {file_name}: {e}")))?;

        let user = users::set_avatar(&state.storage, &caller, &file_name)?;
        tracing::info!(user = %caller.id, file = %file_name, size = bytes.len(), "avatar stored");
        return Ok(envelope(&user));
    }
    Err(AppError::Validation("\"avatar\" file is required".to_string()))
}

#[utoipa::path(
    patch, path = "/api/users/refresh", tag = "users",
    request_body = RefreshBody,
    responses((status = 200, body = Tokens), (status = 401, body = ErrorBody))
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<RefreshBody>,
) -> Result<Json<Tokens>, AppError> {
    let pair = users::refresh(&state.storage, &state.config, body)?;
    Ok(Json(pair.into()))
}

#[utoipa::path(
    get, path = "/api/users/all", tag = "users",
    responses((status = 200, body = UsersEnvelope), (status = 403, body = ErrorBody)),
    security(("bearer" = []))
)]
pub async fn all(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<UsersEnvelope>, AppError> {
    let users = users::all(&state.storage, &caller)?;
    Ok(Json(UsersEnvelope {
        users: users.iter().map(|u| u.view()).collect(),
    }))
}

#[utoipa::path(
    delete, path = "/api/users/{id}", tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, body = DeletedUser),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Acting on yourself", body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<DeletedUser>, AppError> {
    let user = users::delete(&state.storage, &caller, &id)?;
    Ok(Json(DeletedUser {
        user: user.view(),
        message: "User was deleted".to_string(),
    }))
}

#[utoipa::path(
    patch, path = "/api/users/{id}", tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, body = UserEnvelope),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody),
    ),
    security(("bearer" = []))
)]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateUser>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = users::edit(&state.storage, &state.config, &caller, &id, body)?;
    Ok(envelope(&user))
}
