use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::AppState;
use crate::auth::bearer_token;
use crate::error::AppError;
use crate::models::Caller;
use crate::service::users;

/// Resolves `Authorization: Bearer <token>` to the live session's user and
/// stores the [`Caller`] in the request extensions.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(AppError::unauthorized)?;

    let user = users::resolve_session(&state.storage, &state.config, token)?;
    tracing::debug!(user = %user.id, "request authenticated");

    req.extensions_mut().insert(Caller::from(&user));
    Ok(next.run(req).await)
}
