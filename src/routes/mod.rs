use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::AuthService,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::providers::MetadataProvider,
    store::Store,
};

pub mod auth;
pub mod groups;
pub mod invites;
pub mod movies;
pub mod profile;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        metadata: Arc<dyn MetadataProvider>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            store,
            metadata,
            auth,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        // Profile
        .route("/me", get(profile::get_me).patch(profile::update_me))
        .route("/me/genres/:genre", post(profile::toggle_genre))
        .route("/me/invites", get(invites::list_mine))
        // Groups
        .route("/groups", get(groups::list).post(groups::create))
        .route(
            "/groups/:group_id",
            get(groups::get).patch(groups::update).delete(groups::delete),
        )
        .route("/groups/:group_id/members", get(groups::members))
        .route("/groups/:group_id/leave", post(groups::leave))
        .route("/groups/:group_id/invites", post(invites::create))
        .route("/invites/:invite_id/accept", post(invites::accept))
        .route("/invites/:invite_id/decline", post(invites::decline))
        // Watchlist
        .route("/groups/:group_id/watchlist", get(movies::watchlist))
        .route("/groups/:group_id/movies", post(movies::add))
        .route(
            "/groups/:group_id/movies/:imdb_id",
            axum::routing::delete(movies::remove),
        )
        .route("/groups/:group_id/movies/:imdb_id/toggle", post(movies::toggle))
        .route("/groups/:group_id/movies/:imdb_id/me", get(movies::my_state))
        .route("/groups/:group_id/movies/:imdb_id/vote", put(movies::vote))
        .route("/groups/:group_id/movies/:imdb_id/seen", put(movies::set_seen))
        // Movies
        .route("/movies/search", get(movies::search))
        .route("/movies/:imdb_id", get(movies::details))
        .route("/movies/:imdb_id/rating", put(movies::rate))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{middleware::REQUEST_ID_HEADER, services::providers::MockMetadataProvider, store::InMemoryStore};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockMetadataProvider::new()),
            Arc::new(AuthService::new("test-secret".into(), 60, 4)),
        ))
    }

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_unknown_route_still_tagged() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/api/v1/groups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
