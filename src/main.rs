//! Envelope gateway.
//!
//! ```text
//!                        ┌──────────────────────────────────────────┐
//!                        │             ENVELOPE GATEWAY             │
//!   sealed request       │  ┌──────────┐   ┌───────────┐            │
//!   ─────────────────────┼─▶│ envelope │──▶│  forward  │────────────┼──▶ upstream API
//!                        │  │  (open)  │   │ (hyper)   │            │    (plaintext)
//!   sealed reply         │  ├──────────┤   └─────┬─────┘            │
//!   ◀────────────────────┼──│ envelope │◀────────┘                  │
//!                        │  │  (seal)  │                            │
//!                        │  └──────────┘                            │
//!                        │  request id · timeout · trace · metrics  │
//!                        └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use envelope_gateway::config::load_or_default;
use envelope_gateway::crypto::{EnvelopeCodec, EnvelopeKey};
use envelope_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use envelope_gateway::observability::{logging, metrics};
use envelope_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "envelope-gateway")]
#[command(about = "Envelope-sealing gateway in front of a plaintext API", long_about = None)]
struct Args {
    /// Path to the TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `gateway.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("envelope-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let key = EnvelopeKey::from_env(&config.crypto.key_env)?;
    let codec = Arc::new(EnvelopeCodec::with_replay_window(
        key,
        Duration::from_secs(config.crypto.replay_window_secs),
    ));

    tracing::info!(
        bind_address = %config.gateway.bind_address,
        upstream = %config.gateway.upstream,
        request_timeout_secs = config.timeouts.request_secs,
        replay_window_secs = config.crypto.replay_window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = GatewayServer::new(&config, codec)?;
    let listener = TcpListener::bind(&config.gateway.bind_address).await?;

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    spawn_signal_listener(shutdown);

    server.run(listener, rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
