use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use cinesync::{
    auth::AuthService,
    error::{AppError, AppResult},
    models::{CriticRating, ImdbId, MovieMetadata, MovieSummary},
    routes::{create_router, AppState},
    services::providers::MetadataProvider,
    store::InMemoryStore,
};

/// Serves two known titles and fails for anything else
struct StubProvider;

#[async_trait::async_trait]
impl MetadataProvider for StubProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<MovieSummary>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Search query cannot be empty".into()));
        }
        Ok(vec![MovieSummary {
            imdb_id: "tt0133093".parse()?,
            title: "The Matrix".into(),
            year: "1999".into(),
            title_type: "movie".into(),
            poster: String::new(),
        }])
    }

    async fn details(&self, imdb_id: &ImdbId) -> AppResult<MovieMetadata> {
        let (title, genre, rt) = match imdb_id.as_str() {
            "tt0133093" => ("The Matrix", "Action, Sci-Fi", "83%"),
            "tt0110912" => ("Pulp Fiction", "Crime, Drama", "92%"),
            other => return Err(AppError::NotFound(other.to_string())),
        };
        let mut metadata = MovieMetadata::placeholder(imdb_id.clone());
        metadata.title = title.into();
        metadata.genre = genre.into();
        metadata.ratings.push(CriticRating {
            source: "Rotten Tomatoes".into(),
            value: rt.into(),
        });
        Ok(metadata)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

fn create_test_server() -> TestServer {
    let state = AppState::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(StubProvider),
        Arc::new(AuthService::new("test-secret".into(), 3600, 4)),
    );
    TestServer::new(create_router(state)).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

/// Signs up and returns (token, user id)
async fn sign_up(server: &TestServer, email: &str, username: &str) -> (String, String) {
    let response = server
        .post("/api/v1/auth/signup")
        .json(&json!({ "email": email, "password": "password1", "username": username }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_group(server: &TestServer, token: &str, name: &str) -> String {
    let response = server
        .post("/api/v1/groups")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

/// Invites `email` and accepts as the invitee
async fn join(server: &TestServer, group: &str, admin: &str, email: &str, token: &str) {
    let response = server
        .post(&format!("/api/v1/groups/{}/invites", group))
        .add_header(AUTHORIZATION, bearer(admin))
        .json(&json!({ "email": email }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let invite: Value = response.json();

    server
        .post(&format!("/api/v1/invites/{}/accept", invite["id"].as_str().unwrap()))
        .add_header(AUTHORIZATION, bearer(token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let id = "6f1c1a86-7c0a-4d1e-9d5e-0e9f3b0d5b11";
    let response = server
        .get("/health")
        .add_header(HeaderName::from_static("x-request-id"), HeaderValue::from_static(id))
        .await;
    assert_eq!(response.header("x-request-id"), id);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let server = create_test_server();
    server
        .get("/api/v1/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/me")
        .add_header(AUTHORIZATION, bearer("garbage"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_sign_up_sign_in_and_profile() {
    let server = create_test_server();
    let (token, _) = sign_up(&server, "ann@example.com", "ann").await;

    server
        .post("/api/v1/auth/signup")
        .json(&json!({ "email": "ANN@example.com", "password": "password1" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .post("/api/v1/auth/signin")
        .json(&json!({ "email": "ann@example.com", "password": "nope-nope" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/signin")
        .json(&json!({ "email": "ann@example.com", "password": "password1" }))
        .await;
    response.assert_status_ok();

    let response = server
        .patch("/api/v1/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "bio": "Mostly horror", "theme": "light" }))
        .await;
    response.assert_status_ok();
    let profile: Value = response.json();
    assert_eq!(profile["bio"], "Mostly horror");
    assert_eq!(profile["theme"], "light");
    assert!(profile.get("password_hash").is_none());

    server
        .patch("/api/v1/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "bio": "x".repeat(151) }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/me/genres/Horror")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let profile: Value = response.json();
    assert_eq!(profile["favorite_genres"], json!(["Horror"]));
}

#[tokio::test]
async fn test_group_lifecycle() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;
    let (bob, _) = sign_up(&server, "bob@example.com", "bob").await;
    let group = create_group(&server, &ann, "Friday Films").await;

    let response = server
        .get(&format!("/api/v1/groups/{}", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await;
    let body: Value = response.json();
    assert_eq!(body["sort_by"], "Rotten Tomatoes Rating");
    assert_eq!(body["fairness_filter"], true);

    server
        .get(&format!("/api/v1/groups/{}", group))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/v1/groups")
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "name": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    join(&server, &group, &ann, "bob@example.com", &bob).await;

    let response = server
        .get(&format!("/api/v1/groups/{}/members", group))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await;
    let members: Vec<Value> = response.json();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["role"], "admin");
    assert_eq!(members[1]["username"], "bob");

    let response = server
        .patch(&format!("/api/v1/groups/{}", group))
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "sort_by": "Liked" }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["sort_by"], "Liked");

    server
        .delete(&format!("/api/v1/groups/{}", group))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/v1/groups/{}/leave", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .delete(&format!("/api/v1/groups/{}", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get("/api/v1/groups")
        .add_header(AUTHORIZATION, bearer(&bob))
        .await;
    let groups: Vec<Value> = response.json();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn test_two_member_watchlist_flow() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;
    let (bob, _) = sign_up(&server, "bob@example.com", "bob").await;
    let group = create_group(&server, &ann, "Friday Films").await;
    join(&server, &group, &ann, "bob@example.com", &bob).await;

    let movies = format!("/api/v1/groups/{}/movies", group);
    let matrix = format!("{}/tt0133093", movies);
    let watchlist = format!("/api/v1/groups/{}/watchlist", group);

    server
        .post(&movies)
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "imdb_id": "tt0133093" }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post(&movies)
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "imdb_id": "tt0133093" }))
        .await
        .assert_status(StatusCode::CONFLICT);
    server
        .post(&movies)
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "imdb_id": "matrix" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put(&format!("{}/vote", matrix))
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "vote": "up" }))
        .await
        .assert_status_ok();
    server
        .put(&format!("{}/vote", matrix))
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "vote": "down" }))
        .await
        .assert_status_ok();

    let view: Value = server
        .get(&watchlist)
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(view["watchlist"][0]["net_score"], 0);
    assert_eq!(view["watchlist"][0]["title"], "The Matrix");
    assert_eq!(view["watchlist"][0]["added_by_username"], "ann");

    server
        .put(&format!("{}/seen", matrix))
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "seen": true }))
        .await
        .assert_status_ok();

    let view: Value = server
        .get(&watchlist)
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(view["watchlist"][0]["seen_count"], 1);
    assert_eq!(view["watchlist"][0]["member_count"], 2);
    assert_eq!(view["watched"], json!([]));

    server
        .put(&format!("{}/seen", matrix))
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "seen": true }))
        .await
        .assert_status_ok();

    let view: Value = server
        .get(&watchlist)
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .json();
    assert_eq!(view["watchlist"], json!([]));
    assert_eq!(view["watched"][0]["imdb_id"], "tt0133093");
    assert_eq!(view["watched"][0]["seen_count"], 2);

    let state: Value = server
        .get(&format!("{}/me", matrix))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .json();
    assert_eq!(state["vote"], "down");
    assert_eq!(state["seen"], true);
}

#[tokio::test]
async fn test_ratings_genre_filter_and_placeholders() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;
    let (bob, _) = sign_up(&server, "bob@example.com", "bob").await;
    let group = create_group(&server, &ann, "Friday Films").await;
    let movies = format!("/api/v1/groups/{}/movies", group);

    for id in ["tt0133093", "tt0110912", "tt9999999"] {
        server
            .post(&movies)
            .add_header(AUTHORIZATION, bearer(&ann))
            .json(&json!({ "imdb_id": id }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    for (token, stars) in [(&ann, 3), (&bob, 4)] {
        server
            .put("/api/v1/movies/tt0110912/rating")
            .add_header(AUTHORIZATION, bearer(token))
            .json(&json!({ "stars": stars }))
            .await
            .assert_status_ok();
    }
    server
        .put("/api/v1/movies/tt0110912/rating")
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "stars": 6 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let view: Value = server
        .get(&format!("/api/v1/groups/{}/watchlist", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    let list = view["watchlist"].as_array().unwrap();
    let ids: Vec<&str> = list.iter().map(|m| m["imdb_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["tt0110912", "tt0133093", "tt9999999"]);
    assert_eq!(list[0]["average_rating"], 4);
    assert_eq!(list[0]["rating_count"], 2);
    assert_eq!(list[2]["title"], "Unknown");
    assert_eq!(list[2]["genre"], "N/A");

    let view: Value = server
        .get(&format!("/api/v1/groups/{}/watchlist", group))
        .add_query_param("genre", "sci-fi")
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(view["watchlist"].as_array().unwrap().len(), 1);
    assert_eq!(view["watchlist"][0]["imdb_id"], "tt0133093");
}

#[tokio::test]
async fn test_toggle_and_remove_movie() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;
    let group = create_group(&server, &ann, "Solo").await;
    let matrix = format!("/api/v1/groups/{}/movies/tt0133093", group);

    let body: Value = server
        .post(&format!("{}/toggle", matrix))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(body["listed"], true);

    server
        .delete(&matrix)
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&matrix)
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invites_for_me_and_decline() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;
    let (bob, _) = sign_up(&server, "bob@example.com", "bob").await;
    let group = create_group(&server, &ann, "Friday Films").await;

    server
        .post(&format!("/api/v1/groups/{}/invites", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "email": "Bob@Example.com" }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post(&format!("/api/v1/groups/{}/invites", group))
        .add_header(AUTHORIZATION, bearer(&ann))
        .json(&json!({ "email": "bob@example.com" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let pending: Vec<Value> = server
        .get("/api/v1/me/invites")
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .json();
    assert_eq!(pending.len(), 1);
    let invite_id = pending[0]["id"].as_str().unwrap();

    server
        .post(&format!("/api/v1/invites/{}/accept", invite_id))
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/v1/invites/{}/decline", invite_id))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let pending: Vec<Value> = server
        .get("/api/v1/me/invites")
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .json();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_movie_search_and_details() {
    let server = create_test_server();
    let (ann, _) = sign_up(&server, "ann@example.com", "ann").await;

    let results: Vec<Value> = server
        .get("/api/v1/movies/search")
        .add_query_param("q", "matrix")
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(results[0]["imdb_id"], "tt0133093");

    let details: Value = server
        .get("/api/v1/movies/tt0110912")
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .json();
    assert_eq!(details["title"], "Pulp Fiction");

    server
        .get("/api/v1/movies/tt0000001")
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/v1/movies/bogus")
        .add_header(AUTHORIZATION, bearer(&ann))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
