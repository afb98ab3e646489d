//! HTTP API over the paginated query service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/{collection}` | One page of a collection |
//! | `GET`  | `/{parent}/{id}` | One page of the parent's sub-view, scoped to `id` |
//! | `POST` | `/{collection}` | Insert an item, returns `201 {"id": ...}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Listing endpoints take `page`, `per_page`, `sort_by`, and `order` query
//! parameters; every other query parameter is an equality filter.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "invalid sort_by: Invalid sort_by field: nonexistent_field (sortable: ...)" }
//! ```
//!
//! `400` for invalid parameters, `404` for an unknown collection or parent
//! id, `500` with the fixed message `Internal server error` when the store
//! fails. Store failure details are logged, never returned.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use vocab_pager_core::error::QueryError;
use vocab_pager_core::models::ItemId;
use vocab_pager_core::paginate::{ListParams, PageResult};

use crate::backend::open_store;
use crate::config::Config;
use crate::service::QueryService;

type AppState = Arc<QueryService>;

/// Starts the HTTP server on `[server].bind` with the configured backend.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let service = Arc::new(QueryService::from_config(config, store)?);

    let listener = TcpListener::bind(&config.server.bind).await?;
    println!(
        "Serving {} collections ({} backend) on http://{}",
        service.catalog().len(),
        service.backend(),
        listener.local_addr()?
    );

    serve(listener, service).await
}

/// Serves the API on an already-bound listener.
pub async fn serve(listener: TcpListener, service: Arc<QueryService>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "http server listening");
    axum::serve(listener, router(service)).await?;
    Ok(())
}

pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/{collection}", get(handle_list).post(handle_insert))
        .route("/{collection}/{id}", get(handle_list_child))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidArgument { .. } => bad_request(err.to_string()),
            QueryError::NotFound(message) => AppError {
                status: StatusCode::NOT_FOUND,
                message,
            },
            // Cause already logged by the service
            QueryError::StoreUnavailable { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal server error".to_string(),
            },
        }
    }
}

// ============ Query string ============

/// Splits a raw query string map into paging parameters and filters.
fn list_params(mut query: HashMap<String, String>) -> Result<ListParams, AppError> {
    let page = parse_int(&mut query, "page")?;
    let per_page = parse_int(&mut query, "per_page")?;
    let sort_by = query.remove("sort_by");
    let order = query.remove("order");

    Ok(ListParams {
        page,
        per_page,
        sort_by,
        order,
        filters: query.into_iter().collect(),
    })
}

fn parse_int(query: &mut HashMap<String, String>, name: &str) -> Result<Option<i64>, AppError> {
    match query.remove(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            bad_request(format!("invalid {}: {} must be an integer, got '{}'", name, name, raw))
        }),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /{collection} ============

async fn handle_list(
    State(service): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PageResult>, AppError> {
    let params = list_params(query)?;
    let page = service.query(&collection, params).await?;
    Ok(Json(page))
}

// ============ GET /{parent}/{id} ============

async fn handle_list_child(
    State(service): State<AppState>,
    Path((parent, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PageResult>, AppError> {
    let params = list_params(query)?;
    let page = service.query_child(&parent, &id, params).await?;
    Ok(Json(page))
}

// ============ POST /{collection} ============

#[derive(Serialize)]
struct InsertResponse {
    id: ItemId,
}

async fn handle_insert(
    State(service): State<AppState>,
    Path(collection): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertResponse>), AppError> {
    let Json(body) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    let Value::Object(fields) = body else {
        return Err(bad_request("request body must be a JSON object"));
    };

    let id = service.insert(&collection, fields).await?;
    Ok((StatusCode::CREATED, Json(InsertResponse { id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_list_params_splits_filters() {
        let params = list_params(query(&[
            ("page", "2"),
            ("per_page", "5"),
            ("sort_by", "english"),
            ("order", "desc"),
            ("language", "salish"),
        ]))
        .ok()
        .unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.per_page, Some(5));
        assert_eq!(params.sort_by.as_deref(), Some("english"));
        assert_eq!(params.order.as_deref(), Some("desc"));
        assert_eq!(params.filters.len(), 1);
        assert_eq!(params.filters["language"], "salish");
    }

    #[test]
    fn test_non_integer_page_rejected() {
        let err = list_params(query(&[("page", "two")])).err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("page"));

        let err = list_params(query(&[("per_page", "1.5")])).err().unwrap();
        assert!(err.message.contains("per_page"));
    }

    #[test]
    fn test_store_failure_hides_cause() {
        let err = AppError::from(QueryError::StoreUnavailable {
            collection: "words".to_string(),
            operation: "count",
            retryable: false,
            source: anyhow::anyhow!("database is locked"),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_status_mapping() {
        let err = AppError::from(QueryError::invalid("order", "bad"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err = AppError::from(QueryError::unknown_collection("verbs"));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "collection not found: verbs");
    }
}
