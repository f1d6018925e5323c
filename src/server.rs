use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::categories::CategoryIndex;
use crate::domain::Event;
use crate::error::{QfapError, Result};
use crate::query::Filter;
use crate::repository::EventRepository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<EventRepository>,
    /// Events shown on the home page and by default on category pages.
    pub upcoming_count: usize,
}

impl IntoResponse for QfapError {
    fn into_response(self) -> Response {
        let status = match &self {
            QfapError::NotFound(_) => StatusCode::NOT_FOUND,
            QfapError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            QfapError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "qfap",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Serialize)]
struct Home {
    upcoming: Vec<Event>,
    categories: CategoryIndex,
}

/// Upcoming events and the category index
async fn home(State(state): State<AppState>) -> Result<Json<Home>> {
    Ok(Json(Home {
        upcoming: state.repository.get_upcoming(state.upcoming_count).await?,
        categories: state.repository.get_all_categories(),
    }))
}

async fn event(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Event>> {
    Ok(Json(state.repository.get_by_id(&id).await?))
}

async fn occurrences(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BTreeSet<i64>>> {
    Ok(Json(state.repository.get_occurrences(&id).await?))
}

/// Search with the form parameters of the search page, plus `limit`.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Event>>> {
    let limit = match params.get("limit").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| QfapError::InvalidQuery(format!("limit {raw:?} is not a number")))?,
        None => 0,
    };
    let filter = Filter::from_params(&params);
    Ok(Json(state.repository.search(&filter, limit).await?))
}

async fn categories(State(state): State<AppState>) -> Json<CategoryIndex> {
    Json(state.repository.get_all_categories())
}

#[derive(Debug, Deserialize)]
struct CategoryParams {
    n: Option<usize>,
    seed: Option<u64>,
}

async fn category_upcoming(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Result<Json<Vec<Event>>> {
    let n = params.n.unwrap_or(state.upcoming_count);
    Ok(Json(
        state.repository.get_upcoming_by_category(n, &name).await?,
    ))
}

async fn category_random(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Result<Json<Vec<Event>>> {
    let n = params.n.unwrap_or(state.upcoming_count);
    let seed = params.seed.unwrap_or_else(rand::random);
    Ok(Json(
        state
            .repository
            .get_random_by_category(n, &name, seed)
            .await?,
    ))
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/", get(home))
        .route("/event/:id", get(event))
        .route("/event/:id/occurrences", get(occurrences))
        .route("/search", get(search))
        .route("/categories", get(categories))
        .route("/category/:name/upcoming", get(category_upcoming))
        .route("/category/:name/random", get(category_random))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
