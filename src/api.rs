use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::headers::{authorization::Basic, Authorization};
use axum_extra::TypedHeader;
use serde::Deserialize;
use sorng_ftp_drop::dropzone::{
    Connector, Credentials, DropError, DropErrorKind, DropService, EnsureOutcome, UploadFile,
};
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::Instrument;
use uuid::Uuid;

type BasicAuth = Option<TypedHeader<Authorization<Basic>>>;
type ApiResult = Result<Json<serde_json::Value>, ApiError>;

pub struct ApiService<C: Connector> {
    pub drop_service: Arc<DropService<C>>,
    max_upload_bytes: usize,
}

impl<C: Connector + 'static> ApiService<C> {
    pub fn new(drop_service: DropService<C>, max_upload_bytes: usize) -> Self {
        Self {
            drop_service: Arc::new(drop_service),
            max_upload_bytes,
        }
    }

    pub async fn start_server(
        self: Arc<Self>,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("upload service listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    pub fn create_router(self: Arc<Self>) -> Router {
        let limit = self.max_upload_bytes;
        Router::new()
            .route("/health", get(health_check))
            .route("/api/login", post(login::<C>))
            .route("/api/browse", get(browse::<C>))
            .route("/api/folders", post(create_folder::<C>))
            .route("/api/upload", post(upload::<C>))
            .layer(DefaultBodyLimit::max(limit))
            .layer(middleware::from_fn(request_span))
            .with_state(self)
    }

    fn reject(&self, error: DropError) -> ApiError {
        ApiError {
            error,
            realm: self.drop_service.config().realm.clone(),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn request_span(req: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    async move {
        let response = next.run(req).await;
        tracing::info!(status = response.status().as_u16(), "handled");
        response
    }
    .instrument(span)
    .await
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Whole-operation failure, rendered once as JSON.
#[derive(Debug)]
pub struct ApiError {
    error: DropError,
    realm: String,
}

pub fn status_for(kind: DropErrorKind) -> StatusCode {
    match kind {
        DropErrorKind::AuthFailed | DropErrorKind::Unreachable => StatusCode::UNAUTHORIZED,
        DropErrorKind::Validation => StatusCode::BAD_REQUEST,
        DropErrorKind::NotFound => StatusCode::NOT_FOUND,
        DropErrorKind::NameConflict => StatusCode::CONFLICT,
        DropErrorKind::Transfer | DropErrorKind::Protocol => StatusCode::BAD_GATEWAY,
        DropErrorKind::Io | DropErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.error.kind);
        let body = Json(serde_json::json!({
            "success": false,
            "error": {
                "kind": self.error.kind,
                "message": self.error.message,
            }
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", self.realm))
                .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"ftp-drop\""));
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }
        response
    }
}

// ─── Credentials ─────────────────────────────────────────────────────

/// Form fields win over the `Authorization` header.
fn caller(basic: BasicAuth, username: Option<String>, password: Option<String>) -> Result<Credentials, DropError> {
    match (username, basic) {
        (Some(user), _) if !user.is_empty() => Ok(Credentials::new(user, password.unwrap_or_default())),
        (_, Some(TypedHeader(auth))) => Ok(Credentials::new(auth.username(), auth.password())),
        _ => Err(DropError::auth_failed("credentials required")),
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ftp-drop",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Deserialize, Default)]
struct LoginForm {
    username: Option<String>,
    password: Option<String>,
}

async fn login<C: Connector + 'static>(
    State(api): State<Arc<ApiService<C>>>,
    basic: BasicAuth,
    form: Option<Form<LoginForm>>,
) -> ApiResult {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let creds = caller(basic, form.username, form.password).map_err(|e| api.reject(e))?;
    let model = api
        .drop_service
        .verify(&creds)
        .await
        .map_err(|e| api.reject(e))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Login successful",
        "data": model
    })))
}

#[derive(Deserialize)]
struct BrowseQuery {
    path: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

async fn browse<C: Connector + 'static>(
    State(api): State<Arc<ApiService<C>>>,
    basic: BasicAuth,
    Query(query): Query<BrowseQuery>,
) -> ApiResult {
    let creds = caller(basic, query.username, query.password).map_err(|e| api.reject(e))?;
    let path = query.path.unwrap_or_else(root_path);
    let model = api
        .drop_service
        .handle_view(&path, &creds)
        .await
        .map_err(|e| api.reject(e))?;
    Ok(Json(serde_json::json!({ "success": true, "data": model })))
}

#[derive(Deserialize)]
struct CreateFolderForm {
    #[serde(default = "root_path")]
    parent: String,
    #[serde(default)]
    name: String,
    username: Option<String>,
    password: Option<String>,
}

fn root_path() -> String {
    "/".to_string()
}

async fn create_folder<C: Connector + 'static>(
    State(api): State<Arc<ApiService<C>>>,
    basic: BasicAuth,
    Form(form): Form<CreateFolderForm>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let creds = caller(basic, form.username, form.password).map_err(|e| api.reject(e))?;
    let model = api
        .drop_service
        .handle_create(&form.parent, &form.name, &creds)
        .await
        .map_err(|e| api.reject(e))?;
    let status = match model.outcome {
        EnsureOutcome::Created => StatusCode::CREATED,
        EnsureOutcome::Existing => StatusCode::OK,
    };
    Ok((status, Json(serde_json::json!({ "success": true, "data": model }))))
}

/// Decoded multipart upload form.
#[derive(Default)]
struct UploadForm {
    folder: Option<String>,
    username: Option<String>,
    password: Option<String>,
    files: Vec<UploadFile>,
    saw_files_part: bool,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, DropError> {
    let bad_body = |e: axum::extract::multipart::MultipartError| {
        DropError::validation(format!("malformed upload: {}", e.body_text()))
    };
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart.next_field().await.map_err(bad_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                form.saw_files_part = true;
                let filename = field.file_name().unwrap_or_default().to_string();
                let spooled = spool_field(&mut field).await?;
                form.files.push(UploadFile::new(filename, Box::new(spooled)));
            }
            "folder" => form.folder = Some(field.text().await.map_err(bad_body)?),
            "username" => form.username = Some(field.text().await.map_err(bad_body)?),
            "password" => form.password = Some(field.text().await.map_err(bad_body)?),
            other => tracing::debug!("ignoring form field '{}'", other),
        }
    }
    Ok(form)
}

/// Copy one file part to an anonymous temp file, chunk by chunk, and
/// hand it back rewound.
async fn spool_field(field: &mut Field<'_>) -> Result<File, DropError> {
    let spool_err = |e: std::io::Error| DropError::io(format!("cannot spool upload: {}", e));
    let std_file = tempfile::tempfile().map_err(spool_err)?;
    let mut spool = File::from_std(std_file);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| DropError::validation(format!("malformed upload: {}", e.body_text())))?
    {
        spool.write_all(&chunk).await.map_err(spool_err)?;
    }
    spool.flush().await.map_err(spool_err)?;
    spool.seek(SeekFrom::Start(0)).await.map_err(spool_err)?;
    Ok(spool)
}

async fn upload<C: Connector + 'static>(
    State(api): State<Arc<ApiService<C>>>,
    basic: BasicAuth,
    multipart: Multipart,
) -> ApiResult {
    let form = read_upload_form(multipart).await.map_err(|e| api.reject(e))?;
    let creds = caller(basic, form.username, form.password).map_err(|e| api.reject(e))?;
    if !form.saw_files_part {
        return Err(api.reject(DropError::validation("No files part in the request")));
    }
    let folder = form.folder.unwrap_or_else(root_path);
    let model = api
        .drop_service
        .handle_upload(&folder, form.files, &creds)
        .await
        .map_err(|e| api.reject(e))?;
    Ok(Json(serde_json::json!({ "success": true, "data": model })))
}
