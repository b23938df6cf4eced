use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{
    routing::{delete, get, post},
    serve, Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::{auth, catalog, orders, products};
use crate::application::{CatalogService, OrderService, TokenService};
use crate::errors::AppError;
use storefront_types::ports::Store;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

pub struct AppState<R: Store> {
    pub catalog: Arc<CatalogService<R>>,
    pub orders: Arc<OrderService<R>>,
    pub tokens: Arc<TokenService>,
}

// Manual impl: a derive would demand `R: Clone` on the services too.
impl<R: Store> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            orders: self.orders.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<R: Store> AppState<R> {
    pub fn new(repo: R, tokens: TokenService) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(repo.clone())),
            orders: Arc::new(OrderService::new(repo)),
            tokens: Arc::new(tokens),
        }
    }
}

#[derive(Clone)]
pub struct HttpServer<R: Store> {
    pub state: AppState<R>,
    pub config: HttpServerConfig,
}

impl<R: Store> HttpServer<R> {
    pub async fn new(repo: R, tokens: TokenService, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            state: AppState::new(repo, tokens),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/api/auth/token", get(auth::issue_token::<R>))
            .route("/api/product", post(products::create_product::<R>))
            .route("/api/product/products", get(products::list_products::<R>))
            .route(
                "/api/product/products/{filter}",
                get(products::list_filtered_products::<R>),
            )
            .route("/api/product/featured", get(products::featured_products::<R>))
            .route(
                "/api/product/{id}",
                get(products::get_product::<R>)
                    .put(products::update_product::<R>)
                    .delete(products::delete_product::<R>),
            )
            .route(
                "/api/catalog/categories",
                get(catalog::list_categories::<R>).post(catalog::create_category::<R>),
            )
            .route(
                "/api/catalog/sizes",
                get(catalog::list_sizes::<R>).post(catalog::create_size::<R>),
            )
            .route(
                "/api/catalog/{kind}",
                get(catalog::list_lookups::<R>).post(catalog::create_lookup::<R>),
            )
            .route("/api/order/active", get(orders::active_order::<R>))
            .route("/api/order/add-to-cart", post(orders::add_to_cart::<R>))
            .route(
                "/api/order/remove-item/{order_item_id}",
                delete(orders::remove_item::<R>),
            )
            .route("/api/order/checkout", post(orders::checkout::<R>))
            .route("/api/order/{order_id}", get(orders::get_order::<R>))
            .layer(trace_layer)
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server shut down gracefully");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn health() -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        axum::http::StatusCode::OK,
        Json(serde_json::json!({ "status": "ok" })),
    )
}

pub(super) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub(super) fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    param
        .map(|Path(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub(super) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}
