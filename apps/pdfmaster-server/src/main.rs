//! PDF Master Server
//!
//! A browser front end for everyday PDF chores. Every tool is an HTML form
//! that uploads files and downloads the result:
//!
//! - Merge, split, rotate, compress and password-protect PDFs
//! - Stamp a signature image onto a page
//! - Extract text, convert to and from JPG, DOCX and plain text
//!
//! ## Architecture
//!
//! Handlers parse the multipart form, then hand the bytes to
//! `pdfmaster-core` on the blocking pool under a timeout. Nothing is kept
//! between requests; the current tool lives in the URL.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use governor::middleware::NoOpMiddleware;
use pdfmaster_core::{PageRasterizer, PdfiumRasterizer};
use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod ui;
mod upload;

use api::{
    handle_health, handle_home, handle_list_tools, handle_preview, handle_run_tool,
    handle_sign_preview, handle_tool_page,
};

/// Command-line arguments for the PDF Master server
#[derive(Parser, Debug)]
#[command(name = "pdfmaster-server")]
#[command(about = "PDF Master web server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PDFMASTER_PORT", default_value = "8080")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PDFMASTER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Per-request processing timeout in milliseconds
    #[arg(long, env = "PDFMASTER_TIMEOUT_MS", default_value = "30000")]
    timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "PDFMASTER_RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Largest accepted request body in megabytes
    #[arg(long, env = "PDFMASTER_MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// libpdfium to load (file or directory); defaults to the system library
    #[arg(long, env = "PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "PDFMASTER_VERBOSE")]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Page renderer for previews and PDF → JPG
    pub rasterizer: Arc<dyn PageRasterizer>,
    /// Processing timeout in milliseconds
    pub timeout_ms: u64,
}

/// Routes and per-request middleware. Rate limiting is added in `main`
/// because it needs the peer address.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Pages
        .route("/", get(handle_home))
        .route("/tools/sign/preview", post(handle_sign_preview))
        .route("/tools/:id", get(handle_tool_page).post(handle_run_tool))
        // API endpoints
        .route("/api/tools", get(handle_list_tools))
        .route("/api/preview", post(handle_preview))
        // Apply middleware
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-IP limiter admitting `rate` requests per second on average, with
/// bursts of up to twice that
pub fn rate_limit_config(
    rate: u32,
) -> anyhow::Result<GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>> {
    if rate == 0 {
        anyhow::bail!("Rate limit must be at least 1 request per second");
    }
    // One request is replenished per period
    let period_ms = (1000 / u64::from(rate)).max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(period_ms)
        .burst_size(rate.saturating_mul(2))
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit: {}", rate))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PDF Master server on {}:{}", args.host, args.port);

    // Create rate limiter configuration
    let governor_conf = Arc::new(rate_limit_config(args.rate_limit)?);

    // Create shared state
    let state = AppState {
        rasterizer: Arc::new(PdfiumRasterizer::new(args.pdfium_lib.clone())),
        timeout_ms: args.timeout_ms,
    };

    let app = build_router(state, args.max_upload_mb * 1024 * 1024).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("Processing timeout: {}ms", args.timeout_ms);
    info!("Upload limit: {} MB", args.max_upload_mb);
    match &args.pdfium_lib {
        Some(path) => info!("pdfium library: {}", path.display()),
        None => info!("pdfium library: system default"),
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
