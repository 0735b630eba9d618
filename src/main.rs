use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use whois_gateway::{
    config::Config,
    errors::GatewayError,
    metrics,
    models::{RequestType, WhoisRecord, WhoisRequest},
    WhoisGateway,
};

// Upper bound for one lookup, retries and backoff included
const LOOKUP_DEADLINE_SECS: u64 = 150;

#[derive(Clone)]
struct AppState {
    gateway: Arc<WhoisGateway>,
    config: Arc<Config>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupBody {
    #[serde(default)]
    domain_name: String,
    #[serde(rename = "type", default)]
    request_type: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    timestamp: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "whois_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let gateway = Arc::new(WhoisGateway::new(&config)?);
    metrics::init_metrics();

    let app_state = AppState {
        gateway,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/api/whois/lookup", post(whois_lookup))
        .route("/api/status", get(status))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Whois gateway listening on {}", addr);
    info!("Status: http://{}/api/status", addr);
    info!("Metrics: http://{}/metrics", addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, gracefully shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

async fn whois_lookup(
    State(state): State<AppState>,
    body: Result<Json<LookupBody>, JsonRejection>,
) -> Result<Json<WhoisRecord>, GatewayError> {
    let request = parse_body(body).inspect_err(|e| metrics::increment_errors(e.kind()))?;

    let deadline = Duration::from_secs(LOOKUP_DEADLINE_SECS);
    let record = tokio::time::timeout(deadline, state.gateway.lookup(&request))
        .await
        .inspect_err(|_| metrics::increment_errors("lookup_deadline"))??;

    Ok(Json(record))
}

fn parse_body(body: Result<Json<LookupBody>, JsonRejection>) -> Result<WhoisRequest, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let request_type: RequestType = body.request_type.parse()?;
    Ok(WhoisRequest::new(body.domain_name, request_type))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
