use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;


async fn get_metrics(Extension(registry): Extension<Arc<Registry>>) -> Response {
    let mut buffer = String::new();
    if let Err(err) = prometheus_client::encoding::text::encode(&mut buffer, &registry) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/openmetrics-text; version=1.0.0; charset=utf-8")
    );

    (headers, buffer).into_response()
}


pub fn build_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .layer(Extension(Arc::new(registry)))
}


pub async fn run_server(registry: Registry, port: u16) -> anyhow::Result<()> {
    let app = build_router(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving metrics on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
