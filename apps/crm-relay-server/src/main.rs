mod config;
mod email;
mod error;
mod flow;
mod handlers;
mod metrics;
mod server;

#[cfg(test)]
mod tests;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use clap::{Parser, Subcommand};
use crm_relay_otp::{Claims, TokenSigner};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::sync::{oneshot, watch};
use tracing_subscriber::EnvFilter;

use config::RelayConfig;
use server::RelayServer;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "crm-relay-server")]
#[command(about = "CRM request relay with email OTP verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the relay HTTP server
    Serve {
        /// Listen address for the relay, health and metrics routes
        #[arg(long, env = "CRM_RELAY_ADDR", default_value = "0.0.0.0:7071")]
        addr: String,
    },
    /// Signed token utilities
    Token {
        #[command(subcommand)]
        token_cmd: TokenCommand,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Verify a challenge or proof token with EMAIL_OTP_SECRET and print its claims
    Inspect {
        /// The token, as returned by the relay
        token: String,
    },
}

// ────────────────────────────────────── Serve ──────────────────────────────────────

async fn cmd_serve(config: RelayConfig, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    cmd_serve_with_ready(config, addr, None).await
}

async fn cmd_serve_with_ready(
    config: RelayConfig,
    addr: &str,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = addr.parse()?;

    if config.otp_secret.is_none() {
        tracing::warn!("EMAIL_OTP_SECRET is not set; OTP and proof requests will fail");
    }
    if config.workflow.is_none() {
        tracing::warn!("FLOW_ENDPOINT_URL is not set; submissions will fail");
    }
    if !config.verification_required {
        tracing::warn!("Email verification is disabled for submissions");
    }

    let metrics_handle = metrics::init_metrics()?;
    let server = RelayServer::from_config(config)?;

    // /healthz - liveness, always OK
    // /readyz - OK once the listener is bound, 503 after a shutdown signal
    let (readiness_tx, readiness_rx) = watch::channel(false);
    let probes = Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(readiness_handler))
        .with_state(ReadinessCheck::new(readiness_rx));
    let exporter = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let app = handlers::router(server).merge(probes).merge(exporter);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(addr = %actual_addr, "CRM relay listening");

    let _ = readiness_tx.send(true);

    // Notify test that the server is ready
    if let Some(tx) = ready_tx {
        let _ = tx.send(actual_addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Some(readiness_tx)))
        .await?;

    tracing::info!("CRM relay stopped");
    Ok(())
}

#[derive(Clone)]
struct ReadinessCheck {
    ready: watch::Receiver<bool>,
}

impl ReadinessCheck {
    fn new(ready: watch::Receiver<bool>) -> Self {
        Self { ready }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn readiness_handler(State(check): State<ReadinessCheck>) -> Result<&'static str, StatusCode> {
    if *check.ready.borrow() {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn shutdown_signal(readiness_tx: Option<watch::Sender<bool>>) {
    use tokio::signal::unix::{signal, SignalKind};

    let signals = signal(SignalKind::terminate())
        .and_then(|sigterm| signal(SignalKind::interrupt()).map(|sigint| (sigterm, sigint)));
    let (mut sigterm, mut sigint) = match signals {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, shutting down gracefully...");
        }
    }

    // Mark not ready so load balancers drain traffic
    if let Some(tx) = readiness_tx {
        let _ = tx.send(false);
    }
}

// ────────────────────────────────────── Token ──────────────────────────────────────

fn cmd_token_inspect(token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;
    let secret = config
        .otp_secret
        .ok_or("EMAIL_OTP_SECRET is not configured.")?;
    let report = inspect_token(secret.expose(), token, Utc::now().timestamp_millis())?;
    println!("{report}");
    Ok(())
}

/// Render a verified token's claims for operators.
fn inspect_token(
    secret: &str,
    token: &str,
    now_ms: i64,
) -> Result<String, Box<dyn std::error::Error>> {
    let signer = TokenSigner::new(secret)?;
    let claims: Claims = signer
        .verify(token.trim())
        .ok_or("Token is invalid: the signature does not match or the payload is malformed.")?;

    let mut report = serde_json::to_string_pretty(&claims)?;
    report.push('\n');
    if claims.is_expired_at(now_ms) {
        report.push_str(&format!("{} token expired at {} ms", claims.purpose(), claims.exp()));
    } else {
        let remaining = (claims.exp() - now_ms) / 1000;
        report.push_str(&format!("{} token valid for another {remaining}s", claims.purpose()));
    }
    Ok(report)
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { addr } => {
            let config = RelayConfig::from_env()?;
            cmd_serve(config, &addr).await?;
        }
        Command::Token { token_cmd } => match token_cmd {
            TokenCommand::Inspect { token } => cmd_token_inspect(&token)?,
        },
    }

    Ok(())
}

// ────────────────────────────────────── Tests ──────────────────────────────────────
