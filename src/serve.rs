//! Read-only local preview of the output directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, warn};

use crate::config::PreviewConfig;
use crate::render::INDEX;

#[derive(Clone)]
struct PreviewState {
    root: Arc<PathBuf>,
}

pub fn router(root: PathBuf) -> Router {
    let state = PreviewState {
        root: Arc::new(root),
    };
    Router::new()
        .route("/", get(index))
        .route("/{*path}", get(file))
        .with_state(state)
}

pub async fn run(config: &PreviewConfig, root: PathBuf) -> anyhow::Result<()> {
    if !root.is_dir() {
        warn!("{} does not exist yet; run `poll` first", root.display());
    }
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    println!("Serving {} on http://{local_addr}/", root.display());
    axum::serve(listener, router(root)).await?;
    Ok(())
}

async fn index(State(state): State<PreviewState>) -> Response {
    send(&state.root, INDEX).await
}

async fn file(State(state): State<PreviewState>, UrlPath(path): UrlPath<String>) -> Response {
    send(&state.root, &path).await
}

async fn send(root: &Path, rel: &str) -> Response {
    let Some(mut path) = resolve(root, rel) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if path.is_dir() {
        path.push(INDEX);
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("GET {}", path.display());
            ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response()
        }
        Err(e) if e.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Map a request path onto `root`. Anything that could leave `root` gives `None`.
fn resolve(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel.trim_start_matches('/'));
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("csv") => "text/csv; charset=utf-8",
        Some("png") => "image/png",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
