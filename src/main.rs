use std::env;

use macro_api::{app, initialize_state, telemetry};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match env::var(OTLP_ENDPOINT) {
        Ok(endpoint) => {
            let tracer = telemetry::setup_tracer(&endpoint)?;
            opentelemetry::global::set_tracer_provider(tracer);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(telemetry::setup_logging(&endpoint)?)
                .init();
        },
        Err(_) => tracing_subscriber::registry().with(filter).with(fmt::layer()).init(),
    }

    let _metrics = telemetry::setup_metrics_recorder()?;

    let state = initialize_state().await?;
    let port = state.config.port;

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl+c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => tracing::error!(error = %err, "cannot listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
