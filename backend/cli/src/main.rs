use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use clawbridge_core::BridgeConfig;
use clawbridge_gateway::{ConnectParams, GatewayClient};

#[derive(Parser)]
#[command(name = "clawbridge")]
#[command(about = "ClawBridge — browser-to-agent media relay")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind the WebSocket/HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show current relay status
    Status,
    /// Run one handshake against the upstream gateway and report the session
    Gateway,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env();

    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = BridgeConfig {
                port: port.unwrap_or(config.port),
                ..config
            };
            clawbridge_relay::serve(Arc::new(config)).await?;
        }
        Commands::Status => {
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{}/api/health", config.port))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("ClawBridge is not running on port {}", config.port);
                }
            }
        }
        Commands::Gateway => {
            info!(url = %config.gateway_url, "Probing gateway handshake");
            let client = GatewayClient::connect(
                &config.gateway_url,
                ConnectParams::operator(),
                config.gateway_token.as_deref(),
            )
            .await?;

            let protocol = client
                .negotiated_protocol()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let token = if client.session_token().is_some() {
                "granted"
            } else {
                "none"
            };
            println!("Gateway handshake OK (protocol {protocol}, session token {token})");
            client.close().await;
        }
    }

    Ok(())
}
