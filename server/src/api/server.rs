//! API server initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, SignatureState};
use super::routes::{MetricsApiState, health, index, update, value};
use crate::core::CoreApp;
use crate::data::MetricStorage;

/// Build the metrics router.
///
/// Layer order, outermost first: tracing, response compression, request
/// decompression, signature checks. Signatures therefore cover the
/// uncompressed bodies on both directions.
pub fn router(storage: Arc<dyn MetricStorage>, key: Option<String>) -> Router {
    let state = MetricsApiState { storage };

    Router::new()
        .route("/", get(index::index))
        .route("/ping", get(health::ping))
        .route("/update/", post(update::update_json))
        .route("/update/{kind}/{name}/{value}", post(update::update_path))
        .route("/updates/", post(update::update_batch))
        .route("/value/", post(value::value_json))
        .route("/value/{kind}/{name}", get(value::value_plain))
        .with_state(state)
        .fallback(middleware::handle_404)
        .layer(axum::middleware::from_fn_with_state(
            SignatureState::new(key),
            middleware::signature,
        ))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Serve until shutdown is triggered; returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;
        let shutdown = app.shutdown.clone();

        let router = router(app.storage.storage(), app.config.key.clone());

        let address = &app.config.server.address;
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        tracing::info!(
            address = %listener.local_addr()?,
            backend = app.storage.backend_name(),
            signing = app.config.key.is_some(),
            "Server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
