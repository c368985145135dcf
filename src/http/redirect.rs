//! Plain HTTP to HTTPS redirect responder.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::routing::normalize_host;

#[derive(Debug, Clone, Copy)]
struct RedirectState {
    https_port: u16,
}

/// Router answering every request with a permanent redirect to HTTPS.
pub fn redirect_router(https_port: u16) -> Router {
    Router::new()
        .fallback(redirect)
        .layer(TraceLayer::new_for_http())
        .with_state(RedirectState { https_port })
}

/// `https://<host>[:port]<path-and-query>`; the port is omitted when it is 443.
pub fn https_location(host: &str, https_port: u16, uri: &Uri) -> String {
    let host = normalize_host(host);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    if https_port == 443 {
        format!("https://{host}{path}")
    } else {
        format!("https://{host}:{https_port}{path}")
    }
}

async fn redirect(State(state): State<RedirectState>, headers: HeaderMap, uri: Uri) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .or_else(|| uri.host());

    match host {
        Some(host) => {
            let location = https_location(host, state.https_port, &uri);
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        None => (StatusCode::BAD_REQUEST, "Missing Host header\n").into_response(),
    }
}

/// Serve redirects on `listener` until `shutdown` fires.
pub async fn serve_redirect(
    listener: TcpListener,
    https_port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(
        address = %listener.local_addr()?,
        https_port,
        "Redirect listener started"
    );
    axum::serve(listener, redirect_router(https_port))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
