//! HTTP API for the Ephemera node

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Query, State},
    http::{
        header::{self, HeaderName, HeaderValue},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use ephemera_core::{ApiConfig, Document, EphemeraError};
use ephemera_state::{ReadMeta, WriteReceipt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::runtime::NodeRuntime;

/// API state containing node runtime
pub type ApiState = Arc<NodeRuntime>;

pub const DATA_PATH: &str = "/api/data";

const CACHE_CONTROL_VALUE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";
const SURROGATE_CONTROL: &str = "surrogate-control";

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<M: Serialize = ()> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

impl<M: Serialize> ApiResponse<M> {
    pub fn ok(message: impl Into<String>, data: Vec<Document>, meta: M) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: Some(meta),
        }
    }
}

impl ApiResponse {
    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
            meta: None,
        }
    }
}

/// Error wrapper turning store failures into JSON responses
#[derive(Debug)]
pub struct ApiError(pub EphemeraError);

impl From<EphemeraError> for ApiError {
    fn from(err: EphemeraError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ApiResponse::err(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Name of the query parameter carrying the status token
const KEY_PARAM: &str = "key";

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.config().api);
    let body_limit = DefaultBodyLimit::max(state.config().api.max_body_bytes);

    let router = Router::new()
        // Health
        .route("/health", get(health))
        // Slot
        .route(
            DATA_PATH,
            get(get_data)
                .post(post_data)
                .put(put_data)
                .delete(delete_data)
                .patch(patch_data),
        )
        .layer(body_limit)
        .with_state(state)
        // Keep intermediaries from caching any snapshot
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(SURROGATE_CONTROL),
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(config: &ApiConfig) -> Option<CorsLayer> {
    if !config.enable_cors {
        return None;
    }

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

/// The raw `Authorization` header value
fn credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// First value of `key`; later repeats are ignored
fn key_param(query: &[(String, String)]) -> Option<&str> {
    query
        .iter()
        .find(|(name, _)| name == KEY_PARAM)
        .map(|(_, value)| value.as_str())
}

/// A body that could not be buffered is passed on empty, so the runtime
/// still checks credentials first and then reports its usual body failure.
fn body_or_empty(body: Result<Bytes, BytesRejection>) -> Bytes {
    body.unwrap_or_else(|rejection| {
        warn!("Could not read request body: {}", rejection);
        Bytes::new()
    })
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Read the slot
async fn get_data(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<ApiResponse<ReadMeta>> {
    let snapshot = runtime.read(credential(&headers).as_deref(), key_param(&query))?;

    let message = if snapshot.meta.expired_just_now {
        "API is online (data was auto-cleared due to timeout)"
    } else {
        "API is online"
    };
    let data = snapshot.document.into_iter().collect();

    Ok(Json(ApiResponse::ok(message, data, snapshot.meta)))
}

/// Publish a document
async fn post_data(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<ApiResponse<WriteReceipt>> {
    let body = body_or_empty(body);
    let receipt = runtime.publish(credential(&headers).as_deref(), &body)?;
    info!("Published {}", receipt.version);
    Ok(Json(written("Data updated successfully", receipt)))
}

/// Overwrite the document
async fn put_data(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<ApiResponse<WriteReceipt>> {
    let body = body_or_empty(body);
    let receipt = runtime.force_replace(credential(&headers).as_deref(), &body)?;
    Ok(Json(written("Data updated successfully", receipt)))
}

/// Delete the document
async fn delete_data(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ApiResponse<WriteReceipt>> {
    let receipt = runtime.clear(credential(&headers).as_deref())?;
    Ok(Json(written("All data deleted successfully", receipt)))
}

/// Merge fields into the document
async fn patch_data(
    State(runtime): State<ApiState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<ApiResponse<WriteReceipt>> {
    let body = body_or_empty(body);
    let receipt = runtime.patch(credential(&headers).as_deref(), &body)?;
    Ok(Json(written("Data partially updated successfully", receipt)))
}

fn written(message: &str, receipt: WriteReceipt) -> ApiResponse<WriteReceipt> {
    ApiResponse::ok(message, Vec::new(), receipt)
}

/// Bind the API listener
pub async fn bind_api_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind API listener on {}", listen_addr))?;
    info!("API server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Start API server on a bound listener, serving until `shutdown` resolves
pub async fn start_api_server<F>(
    runtime: Arc<NodeRuntime>,
    listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(runtime);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
