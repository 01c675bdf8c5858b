//! Umbra Client Binary
//!
//! Usage: umbra-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -t, --test <FILE>    Test connection to server
//!   -h, --help           Print help information

use std::env;

use serde::Deserialize;
use umbra::proxy::run_socks5_proxy;
use umbra::shadow::{ShadowClient, ShadowConfig};

#[derive(Deserialize)]
struct ClientFile {
    /// Local SOCKS5 listen address.
    #[serde(default = "default_listen")]
    local_listen: String,

    #[serde(flatten)]
    shadow: ShadowConfig,
}

fn default_listen() -> String {
    "127.0.0.1:1080".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-t" | "--test" => {
            if args.len() < 3 {
                eprintln!("Error: --test requires a config file path");
                return Ok(());
            }
            test_connection(&args[2]).await?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_client(&args[2]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"Umbra Client - obfuscating proxy client

USAGE:
    umbra-client [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Run the local SOCKS5 proxy with this configuration
    -t, --test <FILE>    Test the server connection using this configuration
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "local_listen": "127.0.0.1:1080",
        "mode": "darkstar-client",
        "server_public_key": "<hex, darkstar modes>",
        "password": "<classic modes>",
        "server_host": "203.0.113.5",
        "server_port": 8388
    }}

EXAMPLES:
    Test connection:
        umbra-client --test client.json

    Run the SOCKS5 proxy:
        umbra-client --config client.json
"#
    );
}

async fn test_connection(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!(
        "testing {} connection to {}:{}",
        config.shadow.mode,
        config.shadow.server_host,
        config.shadow.server_port
    );

    let client = ShadowClient::new(config.shadow)?;
    match client.connect().await {
        Ok(mut tunnel) => {
            tracing::info!("connection established");
            let _ = tunnel.shutdown().await;
        }
        Err(e) => {
            tracing::error!("connection failed: {}", e);
        }
    }

    Ok(())
}

async fn run_client(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!(
        "tunneling via {}:{} ({})",
        config.shadow.server_host,
        config.shadow.server_port,
        config.shadow.mode
    );

    let client = ShadowClient::new(config.shadow)?;
    run_socks5_proxy(&config.local_listen, client).await?;

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ClientFile> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientFile = serde_json::from_str(&content)?;
    config.shadow.validate()?;
    Ok(config)
}
