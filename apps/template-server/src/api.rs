/// REST API endpoints for template documents and media uploads

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use std::sync::Arc;
use storage::{MediaStore, StoreError, TemplateStore, UploadMetadata};
use template::{Template, TemplateError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::models::*;

pub struct AppState {
    pub templates: Arc<dyn TemplateStore>,
    pub media: Arc<dyn MediaStore>,
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let message = e.to_string();
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(message),
            StoreError::Conflict(_) => ApiError::Conflict(message),
            StoreError::Upstream(_) => ApiError::Upstream(message),
            ref other if other.is_client_error() => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(e: TemplateError) -> Self {
        if e.is_validation() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

/// Maps a multipart read failure. A body over the request limit is reported
/// against the upload policy's byte limit.
fn multipart_error(e: MultipartError, max_bytes: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BadRequest(format!(
            "file is too large; the limit is {} bytes",
            max_bytes
        ))
    } else {
        ApiError::BadRequest(format!("invalid upload: {}", e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Builds the application router. Local uploads are served from `uploads_dir` when given.
pub fn router(state: Arc<AppState>, uploads_dir: Option<&FsPath>, body_limit: usize) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/:filename",
            get(get_template).put(update_template),
        )
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state);

    if let Some(dir) = uploads_dir {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Parses, migrates and validates a request body.
fn parse_template(body: &Bytes) -> Result<Template, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {}", e)))?;
    let (template, report) = Template::from_value(value)?;
    if !report.is_empty() {
        debug!(changes = report.changes.len(), "migrated legacy request body");
    }
    template.validate()?;
    Ok(template)
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /templates - List template filenames
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.templates.list()?))
}

/// GET /templates/:filename - Fetch one template
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<Template>, ApiError> {
    Ok(Json(state.templates.read(&filename)?))
}

/// POST /templates - Save a new template, optionally under `?name=`
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<SavedResponse>), ApiError> {
    let template = parse_template(&body)?;
    let filename = state.templates.create(&template, query.name.as_deref())?;
    info!(file = %filename, scenes = template.scenes.len(), "template saved");
    Ok((
        StatusCode::CREATED,
        Json(SavedResponse {
            message: "Template saved successfully".to_string(),
            filename,
        }),
    ))
}

/// PUT /templates/:filename - Overwrite an existing template
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<Json<SavedResponse>, ApiError> {
    let template = parse_template(&body)?;
    state.templates.update(&filename, &template)?;
    info!(file = %filename, scenes = template.scenes.len(), "template updated");
    Ok(Json(SavedResponse {
        message: "Template updated successfully".to_string(),
        filename,
    }))
}

/// POST /upload - Store the multipart field `file`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_bytes = state.media.policy().max_bytes;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("uploaded file has no name".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        let stored = state
            .media
            .store(
                data.to_vec(),
                UploadMetadata {
                    file_name,
                    content_type,
                },
            )
            .await?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file_path: stored.file_path,
            url: stored.url,
        }));
    }
    Err(ApiError::BadRequest("No file uploaded".to_string()))
}
