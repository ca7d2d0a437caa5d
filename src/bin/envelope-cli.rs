use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Method;
use serde_json::Value;

use envelope_gateway::config::load_or_default;
use envelope_gateway::crypto::{EnvelopeCodec, EnvelopeKey, KEY_LEN};
use envelope_gateway::observability::logging;
use envelope_gateway::pipeline::ApiRequest;
use envelope_gateway::session::LoggingObserver;
use envelope_gateway::SecureClient;

#[derive(Parser)]
#[command(name = "envelope-cli")]
#[command(about = "Seal, open and send envelope-protected API calls", long_about = None)]
struct Cli {
    /// Path to the TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh 32-byte key, hex encoded
    Keygen,
    /// Seal a JSON document into an envelope
    Seal {
        /// Plaintext JSON
        json: String,
    },
    /// Open an envelope and print the plaintext
    Open {
        /// Envelope JSON ({"encrypted", "iv", "timestamp"})
        envelope: String,
    },
    /// Send one call through the secure client
    Call {
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Path relative to `api.base_url`
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Log in first with these credentials
        #[arg(long, requires = "password")]
        email: Option<String>,

        #[arg(long, requires = "email")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    logging::init(&config.observability);

    match cli.command {
        Commands::Keygen => {
            let mut key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut key);
            println!("{}", hex::encode(key));
        }
        Commands::Seal { json } => {
            let codec = codec_from_env(&config.crypto.key_env, config.crypto.replay_window_secs)?;
            let plaintext: Value = serde_json::from_str(&json)?;
            println!("{}", serde_json::to_string_pretty(&codec.encrypt(&plaintext).to_value())?);
        }
        Commands::Open { envelope } => {
            let codec = codec_from_env(&config.crypto.key_env, config.crypto.replay_window_secs)?;
            let sealed: Value = serde_json::from_str(&envelope)?;
            println!("{}", serde_json::to_string_pretty(&codec.decrypt_value(&sealed)?)?);
        }
        Commands::Call {
            method,
            path,
            body,
            email,
            password,
        } => {
            let client = SecureClient::from_config(&config, Arc::new(LoggingObserver))?;

            if let (Some(email), Some(password)) = (email, password) {
                let credentials = serde_json::json!({"email": email, "password": password});
                if let Err(e) = client.login(credentials).await {
                    eprintln!("Login failed: {}", e.user_message());
                    std::process::exit(1);
                }
            }

            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }

            match client.send(request).await {
                Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
                Err(e) => {
                    tracing::debug!(error = %e, "Call failed");
                    eprintln!("Error: {}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn codec_from_env(var: &str, replay_window_secs: u64) -> Result<EnvelopeCodec, Box<dyn std::error::Error>> {
    let key = EnvelopeKey::from_env(var)?;
    Ok(EnvelopeCodec::with_replay_window(
        key,
        Duration::from_secs(replay_window_secs),
    ))
}
