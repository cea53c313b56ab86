//! Explorer routes and static assets

use crate::api::middleware::log_requests;
use crate::api::LedgerService;
use crate::explorer::pages;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use std::sync::Arc;

/// Embedded static files from web/static
#[derive(Embed)]
#[folder = "web/static"]
struct Assets;

#[derive(Clone)]
pub struct ExplorerState {
    pub ledger: Arc<dyn LedgerService>,
}

/// Serve an embedded file with its guessed MIME type
fn serve_static(path: &str) -> Response {
    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content.data.into_owned()),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, Html(pages::error("Not Found"))).into_response(),
    }
}

async fn static_handler(Path(path): Path<String>) -> Response {
    serve_static(&path)
}

/// GET / - Every block, newest first
async fn home(State(state): State<ExplorerState>) -> Html<String> {
    Html(pages::home(&state.ledger.blocks().await))
}

/// GET /add - Block form
async fn add_form() -> Html<String> {
    Html(pages::add_block())
}

/// POST /add - Mine a block and go back home
async fn add_block(State(state): State<ExplorerState>) -> Response {
    match state.ledger.append_block().await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            log::error!("Explorer failed to add block: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::error(&e.to_string())),
            )
                .into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(pages::error("Not Found")))
}

/// Create the HTML explorer router
pub fn create_explorer(state: ExplorerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/add", get(add_form).post(add_block))
        .route("/static/{*path}", get(static_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}
