use crate::{
    config::UploadConfig,
    pages::{self, Notice},
    storage::{RetrieveError, Storage},
    upload::{self, UploadError},
};
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use http::Method;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

// --- State ---
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub storage: Storage,
    pub upload: UploadConfig,
}

/// Builds the application router.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(index_handler))
        // The configured maximum is enforced while streaming instead.
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/files/*name", get(file_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// --- Handlers ---

/// Serves the upload form and the current listing.
async fn index_handler(State(state): State<SharedState>) -> Response {
    render_index(&state, StatusCode::OK, Notice::None).await
}

/// Accepts a multipart upload and re-renders the page with the outcome.
async fn upload_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let result = match multipart {
        Ok(mut multipart) => {
            upload::receive(&state.storage, &state.upload, declared_len, &mut multipart).await
        }
        Err(rejection) => {
            info!("Upload without multipart body: {}", rejection);
            Err(UploadError::MissingFilePart)
        }
    };

    match result {
        Ok(name) => {
            let notice = Notice::Message(format!("Uploaded: {name}"));
            render_index(&state, StatusCode::OK, notice).await
        }
        Err(e) => {
            match &e {
                UploadError::Storage(source) => error!("Upload failed: {}", source),
                _ => warn!("Rejected upload: {}", e),
            }
            render_index(&state, upload_status(&e), Notice::Error(e.to_string())).await
        }
    }
}

/// Streams a stored file inline.
async fn file_handler(
    State(state): State<SharedState>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    let opened = match state.storage.open_file(&name).await {
        Ok(opened) => opened,
        Err(RetrieveError::NotFound) => {
            info!("File not found: {:?}", name);
            return error_response(StatusCode::NOT_FOUND, "File not found.");
        }
        Err(RetrieveError::Io(e)) => {
            error!("Failed to open file for {:?}: {}", name, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Could not read file.");
        }
    };

    let mime_type = mime_guess::from_path(&opened.path)
        .first_or_octet_stream()
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(opened.len));
    // Sanitized names are plain ASCII without quotes.
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("inline; filename=\"{}\"", opened.name))
            .unwrap_or_else(|_| HeaderValue::from_static("inline")),
    );

    let body = Body::from_stream(ReaderStream::new(opened.file));
    (StatusCode::OK, headers, body).into_response()
}

// --- Utility Functions ---

async fn render_index(state: &AppState, status: StatusCode, notice: Notice) -> Response {
    match state.storage.list().await {
        Ok(files) => {
            let page = pages::index_page(state.storage.root(), &files, &notice);
            (status, page).into_response()
        }
        Err(e) => {
            error!("Failed to list {}: {}", state.storage.root().display(), e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading directory contents.",
            )
        }
    }
}

fn upload_status(err: &UploadError) -> StatusCode {
    match err {
        UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        UploadError::MissingFilePart
        | UploadError::NoFileSelected
        | UploadError::InvalidFilename
        | UploadError::ExtensionNotAllowed
        | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
    }
}

/// Helper to generate consistent Maud-based error responses.
fn error_response(status_code: StatusCode, message: &str) -> Response {
    (status_code, pages::error_page(message)).into_response()
}
