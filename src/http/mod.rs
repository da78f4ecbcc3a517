use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{trace::TraceLayer, ServiceBuilderExt};

use crate::{
    config::{Config, ServerConfig},
    error::{ErrorCode, ErrorCodeDetail},
    server_info::ServerInfo,
    service::ServiceHandler,
    webhook,
};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

impl IntoResponse for ErrorCode {
    fn into_response(self) -> Response {
        let details: ErrorCodeDetail = (&self).into();
        (details.status_code(), Json(details)).into_response()
    }
}

#[tracing::instrument(skip_all)]
async fn root(Extension(services): Extension<ServiceHandler>) -> Json<ServerInfo> {
    Json(ServerInfo::new(services.provider().kind().to_string()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

#[tracing::instrument(skip_all)]
pub async fn start_server(
    server_config: ServerConfig,
    config: Config,
    services: ServiceHandler,
) -> color_eyre::Result<()> {
    let addr = server_config.socket_addr()?;

    let app = prepare_router(config, services).await;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        });

    tracing::info!("listening on {}", addr);
    let mut handle = tokio::spawn(server);

    tokio::select! {
        result = &mut handle => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("shutdown requested, draining in-flight requests");
    shutdown_tx.send(()).ok();

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, handle).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            grace_period = ?SHUTDOWN_GRACE_PERIOD,
            "in-flight requests still running, exiting anyway"
        ),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Register the webhook when a public URL is set, then build the router.
///
/// Registration failures never prevent serving.
pub async fn prepare_router(config: Config, services: ServiceHandler) -> Router {
    webhook::register_webhook_on_startup(&config, services.provider()).await;
    build_http_router(config, services)
}

pub fn build_http_router(config: Config, services: ServiceHandler) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .insert_response_header_if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/webhook", post(webhook::webhook))
        .layer(middleware.into_inner())
        .layer(Extension(config))
        .layer(Extension(services))
}
