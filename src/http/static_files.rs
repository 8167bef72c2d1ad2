//! Static frontend serving.
//!
//! Every path not claimed by an API route is looked up under the configured
//! static directory.  Directory requests resolve to `index.html`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::AppState;

const INDEX_FILE: &str = "index.html";

/// Fallback handler for all unmatched routes.
pub async fn handle_static(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let Some(root) = state.config.server.static_dir.as_deref() else {
        return not_found();
    };
    if method != Method::GET && method != Method::HEAD {
        return not_found();
    }

    let Some(mut path) = resolve_static_path(root, uri.path()) else {
        warn!(path = %uri.path(), "rejected static path");
        return not_found();
    };

    let mut meta = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(_) => return not_found(),
    };
    if meta.is_dir() {
        path.push(INDEX_FILE);
        meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return not_found(),
        };
    }
    if !meta.is_file() {
        return not_found();
    }

    let content_type = content_type_for(&path);
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_LENGTH, meta.len().to_string()),
    ];

    if method == Method::HEAD {
        return (StatusCode::OK, headers).into_response();
    }

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to open static file");
            return not_found();
        }
    };
    debug!(path = %path.display(), "serving static file");

    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

/// Map a request path onto a file under `root`.
///
/// Segments are percent-decoded before they are checked.  Returns `None`
/// when any decoded segment could escape `root` or is not valid UTF-8.
pub(crate) fn resolve_static_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let mut path = root.to_path_buf();

    if relative.is_empty() {
        path.push(INDEX_FILE);
        return Some(path);
    }

    let (relative, is_dir) = match relative.strip_suffix('/') {
        Some(stripped) => (stripped, true),
        None => (relative, false),
    };

    for raw in relative.split('/') {
        let segment = percent_decode_str(raw).decode_utf8().ok()?;
        if !is_safe_segment(&segment) {
            return None;
        }
        path.push(&*segment);
    }
    if is_dir {
        path.push(INDEX_FILE);
    }
    Some(path)
}

/// Reject empty, `.`/`..`, and segments carrying separators or NUL bytes.
fn is_safe_segment(segment: &str) -> bool {
    !(segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0')
        || segment.contains(':'))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("csv") => "text/csv; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
