/// Landing page
///
/// Serves a single static page that signs in with Basic credentials, swaps them
/// for a token and drives the todo API from the browser.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
