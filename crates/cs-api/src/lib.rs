use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Method,
    http::Request,
    http::header::{CONTENT_TYPE, HeaderName, HeaderValue},
    middleware,
    middleware::Next,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use dotenvy::dotenv;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use cs_common::blob::{AzureBlobStore, BlobStore};
use cs_common::embedding::{Embedder, OpenAiEmbedder, RetryingEmbedder};
use cs_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cs_common::reference::{self, ReferenceCatalog, ReferenceEmbeddings};

pub mod config;
pub mod error;
pub mod handlers;

pub use config::{AppConfig, Cli, CorsOrigins};
use error::ApiError;
use handlers::{health, similarity, upload};

const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_millis(200);
const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState {
    pub config: AppConfig,
    pub blob_store: Arc<dyn BlobStore>,
    pub embedder: Arc<dyn Embedder>,
    /// Computed once before the listener is bound; read-only afterwards.
    pub references: Arc<ReferenceEmbeddings>,
    pub readiness: Arc<AtomicBool>,
}

pub type SharedState = Arc<AppState>;

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    match origins {
        CorsOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([request_id]),
        CorsOrigins::List(origins) => {
            let allowed = origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>();

            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, request_id.clone()])
                .expose_headers([request_id])
        }
    }
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    error::with_request_id(request_id, next.run(req)).await
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(health::readyz))
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/upload", post(upload::upload_files))
        .route("/calculate_similarity", post(similarity::calculate_similarity))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid,
        ))
        .layer(cors)
        .with_state(state)
}

/// State over caller supplied collaborators, for driving the router in tests.
pub fn test_state(
    blob_store: Arc<dyn BlobStore>,
    embedder: Arc<dyn Embedder>,
    references: ReferenceEmbeddings,
) -> SharedState {
    Arc::new(AppState {
        config: AppConfig::for_tests(),
        blob_store,
        embedder,
        references: Arc::new(references),
        readiness: Arc::new(AtomicBool::new(true)),
    })
}

fn load_catalog(config: &AppConfig) -> Result<ReferenceCatalog, ApiError> {
    match &config.reference_companies_path {
        Some(path) => {
            let catalog = ReferenceCatalog::from_file(path)?;
            info!(path = %path.display(), count = catalog.companies().len(), "loaded reference companies");
            Ok(catalog)
        }
        None => Ok(ReferenceCatalog::builtin()),
    }
}

pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;
    info!(?config, "configuration loaded");

    let blob_store: Arc<dyn BlobStore> = Arc::new(AzureBlobStore::new(config.storage.clone())?);
    let embedder: Arc<dyn Embedder> = Arc::new(RetryingEmbedder::new(OpenAiEmbedder::new(
        config.embedding.clone(),
    )?));

    let catalog = load_catalog(&config)?;
    let references = reference::initialize(&catalog, embedder.as_ref()).await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        blob_store,
        embedder,
        references: Arc::new(references),
        readiness: Arc::new(AtomicBool::new(true)),
    });

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to bind {addr}: {err}")))?;
    info!(%addr, references = state.references.len(), "cs-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    info!("cs-api stopped");
    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.readiness.store(false, Ordering::SeqCst);
    info!("shutdown requested; draining");

    // /readyz must report not-ready before axum stops accepting connections.
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}
