// Student Tracker - Web Server
// Public registration form endpoint plus the admin API for roster uploads
// and reconciliation

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use student_tracker::{
    get_all_students, list_batches, register, setup_database, telemetry, write_unregistered_csv,
    AuthError, Authenticator, Config, ImportSummary, IngestError, ReconciliationReport,
    RegisteredStudent, RegistrationError, RegistrationForm, RowError, Session, SheetFormat,
    TrackerError, TrackingService, UploadBatch,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    auth: Authenticator,
    tracking: Arc<TrackingService>,
}

impl AppState {
    fn new(conn: Connection, auth: Authenticator) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            auth,
            tracking: Arc::new(TrackingService::new("api")),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Unprocessable { message: String, rows: Vec<RowError> },

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rows: Vec<RowError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details stay in the log
        let error = match &self {
            ApiError::Internal(detail) => {
                error!("internal error: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let rows = match self {
            ApiError::Unprocessable { rows, .. } => rows,
            _ => Vec::new(),
        };

        let body = ErrorBody {
            success: false,
            error,
            rows,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::UnknownBatch(_) => ApiError::NotFound(err.to_string()),
            TrackerError::EmptyBatchId | TrackerError::Sheet(_) => {
                ApiError::BadRequest(err.to_string())
            }
            TrackerError::Ingest(IngestError::NoValidRecords { ref errors }) => {
                ApiError::Unprocessable {
                    message: err.to_string(),
                    rows: errors.clone(),
                }
            }
            TrackerError::Storage(e) => ApiError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::UnknownToken | AuthError::Expired => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::EmptyUsername | AuthError::WeakPassword => {
                ApiError::BadRequest(err.to_string())
            }
            AuthError::AdminExists(_) => ApiError::Conflict(err.to_string()),
            AuthError::Hashing(detail) => ApiError::Internal(detail),
            AuthError::Storage(e) => ApiError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::MissingField(_)
            | RegistrationError::InvalidIdentity(_)
            | RegistrationError::InvalidClass(_) => ApiError::BadRequest(err.to_string()),
            RegistrationError::AlreadyRegistered(_) => ApiError::Conflict(err.to_string()),
            RegistrationError::Storage(e) => ApiError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

// ============================================================================
// Admin session extractor
// ============================================================================

/// A validated admin session taken from `Authorization: Bearer <token>`
struct AdminSession(Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let conn = state.conn()?;
        let session = state.auth.validate(&conn, token, Utc::now())?;

        Ok(AdminSession(session))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/register - Public registration form
async fn register_student(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<ApiResponse<RegisteredStudent>>), ApiError> {
    let conn = state.conn()?;
    let student = register(&conn, &form, Utc::now())?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(student))))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// POST /api/admin/login - Exchange credentials for a session token
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    let conn = state.conn()?;
    let session = state.auth.login(&conn, &req.username, &req.password, Utc::now())?;

    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/admin/logout - Revoke the caller's token
async fn logout(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let conn = state.conn()?;
    let revoked = state.auth.logout(&conn, &session.token)?;
    info!(username = %session.username, "admin logged out");

    Ok(Json(ApiResponse::ok(revoked)))
}

/// GET /api/admin/students - All registered students
async fn get_students(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<ApiResponse<Vec<RegisteredStudent>>>, ApiError> {
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(get_all_students(&conn)?)))
}

/// GET /api/admin/batches - Uploaded batches, newest first
async fn get_batches(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<ApiResponse<Vec<UploadBatch>>>, ApiError> {
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(list_batches(&conn)?)))
}

#[derive(Deserialize, Default)]
struct UploadParams {
    /// "csv" (default) or "tsv"
    format: Option<String>,
    /// Original file name, kept for the batch record
    source: Option<String>,
}

/// POST /api/admin/batches/:batch_id - Upload a roster (CSV body)
async fn upload_batch(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    Path(batch_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ImportSummary>>), ApiError> {
    let format = match params.format.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("csv") => SheetFormat::Csv,
        Some("tsv") => SheetFormat::Tsv,
        Some(other) => return Err(ApiError::BadRequest(format!("unsupported format: {}", other))),
    };
    let source = params.source.unwrap_or_else(|| format!("{}.csv", batch_id));

    let conn = state.conn()?;
    let summary = state
        .tracking
        .import_bytes(&conn, &body, &source, &batch_id, format)?;
    info!(username = %session.username, batch = %batch_id, "roster uploaded");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(summary))))
}

/// POST /api/admin/batches/:batch_id/reconcile - Run reconciliation
async fn reconcile_batch(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(batch_id): Path<String>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, ApiError> {
    let conn = state.conn()?;
    let report = state.tracking.reconcile_batch(&conn, &batch_id)?;

    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/admin/batches/:batch_id/unregistered - CSV download
async fn download_unregistered(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(batch_id): Path<String>,
) -> Result<Response, ApiError> {
    let students = {
        let conn = state.conn()?;
        state.tracking.unregistered_for_batch(&conn, &batch_id)?
    };

    let mut csv = Vec::new();
    write_unregistered_csv(&mut csv, &students)?;

    let disposition = format!(
        "attachment; filename=\"unregistered.csv\"; filename*=UTF-8''unregistered-{}.csv",
        urlencoding::encode(&batch_id)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/students", get(get_students))
        .route("/batches", get(get_batches))
        .route("/batches/:batch_id", post(upload_batch))
        .route("/batches/:batch_id/reconcile", post(reconcile_batch))
        .route("/batches/:batch_id/unregistered", get(download_unregistered));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register_student))
        .nest("/admin", admin_routes)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    println!("🌐 Student Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load()?;

    let conn = Connection::open(&config.database.path)?;
    setup_database(&conn)?;
    println!("✓ Database opened: {}", config.database.path);

    let state = AppState::new(conn, Authenticator::new(config.auth.session_ttl_hours));

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   Register: POST http://{}/api/register", addr);
    println!("   Admin:    POST http://{}/api/admin/login", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
