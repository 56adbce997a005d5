pub(crate) mod docs;
pub(crate) mod trigger;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use super::AppState;

pub(crate) async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "up")
}

pub(crate) async fn not_found(State(state): State<AppState>) -> Response {
    not_found_page(&state.not_found_page)
}

pub(crate) fn not_found_page(page: &str) -> Response {
    (StatusCode::NOT_FOUND, Html(page.to_string())).into_response()
}
