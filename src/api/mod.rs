// HTTP surface - handlers, envelope, request parsing and the router

pub mod auth;
pub mod envelope;
pub mod follows;
pub mod form;
pub mod notifications;
pub mod posts;
pub mod uploads;
pub mod users;
pub mod validation;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::middleware::viewer_context_middleware,
};

use envelope::{ApiResponse, Empty};

/// Largest accepted body: the post media cap plus multipart overhead.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

async fn health_check(State(state): State<AppState>) -> AppResult<ApiResponse<Empty>> {
    state.identity.database().health_check().await?;
    Ok(ApiResponse::message("OK"))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let authenticated = Router::new()
        .route("/logout", post(auth::logout))
        // Profile
        .route("/user", get(users::profile))
        .route("/user/search", get(users::search))
        .route("/user/update", post(users::update))
        .route("/user/change-password", put(users::change_password))
        .route(
            "/user/notification-preferences",
            put(users::notification_preferences),
        )
        // Posts
        .route("/posts/my-post", get(posts::my_posts))
        .route("/posts/relevant-post", get(posts::relevant_posts))
        .route("/posts/comments/{id}", get(posts::comments))
        .route("/posts/store", post(posts::store))
        .route("/posts/show/{id}", get(posts::show))
        .route("/posts/update/{id}", post(posts::update))
        .route("/posts/delete/{id}", delete(posts::delete))
        .route("/posts/like/{id}", post(posts::like))
        .route("/posts/unlike/{id}", post(posts::unlike))
        .route("/posts/comment/{id}", post(posts::comment))
        // Follow graph
        .route("/follow/{id}", post(follows::follow))
        .route("/unfollow/{id}", post(follows::unfollow))
        .route("/followers/{id}", get(follows::followers))
        .route("/following/{id}", get(follows::following))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read/{id}", post(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ));

    Router::new()
        .nest("/api", public.merge(authenticated))
        .nest_service("/storage", ServeDir::new(&state.config.storage.root))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
