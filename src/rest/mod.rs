//! REST API layer (Axum), mounted under `/api`.
//!
//! Handlers stay thin: pull the caller out of the request extensions, hand
//! the typed body to a `service` function, wrap the result in the response
//! envelope. Errors flow out as [`AppError`](crate::error::AppError).

use axum::{
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::error::AppError;
use crate::storage::Storage;

pub mod activities;
pub mod auth;
pub mod deliverables;
pub mod docs;
pub mod extract;
pub mod projects;
pub mod sections;
pub mod users;
pub mod works;


/// Shared app state for REST handlers (Arc-wrapped for concurrency)
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub config: Arc<Config>,
}

/// `{ "message": ... }` acknowledgement.
#[derive(Serialize, ToSchema)]
pub struct Message {
    pub message: String,
}

/// Create the application router: `/api` routes, docs, avatars, CORS and
/// request tracing.
pub fn create_router(storage: Storage, config: Config) -> Router {
    let avatars = ServeDir::new(config.avatars_dir());
    let state = Arc::new(AppState {
        storage: Arc::new(storage),
        config: Arc::new(config),
    });

    let protected = Router::new()
        .route("/users/add", post(users::add))
        .route("/users/logout", get(users::logout))
        .route("/users/current", get(users::current))
        .route("/users/update", patch(users::update))
        .route("/users/avatar", patch(users::avatar))
        .route("/users/all", get(users::all))
        .route("/users/:id", patch(users::edit).delete(users::remove))
        .route("/projects/add", post(projects::create))
        .route("/projects/all", get(projects::all))
        .route(
            "/projects/:id",
            get(projects::detail).patch(projects::update).delete(projects::remove),
        )
        .merge(sections::routes())
        .route("/works/add", post(works::create))
        .route("/works/all/:project_id", get(works::list))
        .route("/works/:id", patch(works::update).delete(works::remove))
        .route("/deliverables/add", post(deliverables::create))
        .route("/deliverables/all/:project_id", get(deliverables::list))
        .route(
            "/deliverables/:id",
            patch(deliverables::update).delete(deliverables::remove),
        )
        .route("/activities", post(activities::create))
        // GET takes the project id, PATCH and DELETE the activity id.
        .route(
            "/activities/:id",
            get(activities::list)
                .patch(activities::update)
                .delete(activities::remove),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    let api = Router::new()
        .route("/health", get(health))
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/refresh", patch(users::refresh))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", docs::ApiDoc::openapi()))
        .nest_service("/avatars", avatars)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(get, path = "/api/health", tag = "health", responses((status = 200, body = Message)))]
pub async fn health() -> Json<Message> {
    Json(Message {
        message: "pmbook API healthy".to_string(),
    })
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
