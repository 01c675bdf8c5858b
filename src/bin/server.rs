//! Umbra Server Binary
//!
//! Usage: umbra-server [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -g, --keygen         Generate a DarkStar persistent keypair
//!   -h, --help           Print help information

use std::env;

use umbra::darkstar::{PersistentSecret, PublicKey};
use umbra::shadow::{ShadowServer, ShadowServerConfig};

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
        "-g" | "--keygen" => {
            generate_keypair();
        }
        "--show-pubkey" => {
            if args.len() < 3 {
                eprintln!("Error: --show-pubkey requires a config file path");
                return Ok(());
            }
            show_pubkey(&args[2])?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_server(&args[2]).await?;
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
        r#"Umbra Server - obfuscating proxy server

USAGE:
    umbra-server [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Run the server with this configuration
    -g, --keygen            Generate a DarkStar persistent keypair
    --show-pubkey <FILE>    Show the public key for an existing config
    -h, --help              Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "mode": "darkstar-server",
        "server_private_key": "<hex, darkstar mode>",
        "password": "<classic modes>",
        "listen_host": "0.0.0.0",
        "listen_port": 8388
    }}

EXAMPLES:
    Generate a keypair:
        umbra-server --keygen

    Run the server:
        umbra-server --config server.json
"#
    );
}

fn generate_keypair() {
    let secret = PersistentSecret::random();
    let public = PublicKey::from(&secret);

    println!("# Put this in server.json (keep it secret):");
    println!("\"server_private_key\": \"{}\"", hex::encode(*secret.to_bytes()));
    println!();
    println!("# Distribute this to clients:");
    println!("\"server_public_key\": \"{}\"", hex::encode(public.to_compact_bytes()));
}

fn show_pubkey(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let secret = config.persistent_secret()?;
    let public = PublicKey::from(&secret);

    println!("Server public key (hex): {}", hex::encode(public.to_compact_bytes()));
    Ok(())
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!(
        "starting server on {}:{} ({})",
        config.listen_host,
        config.listen_port,
        config.mode
    );

    let server = ShadowServer::new(config)?;
    server.run().await?;

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ShadowServerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ShadowServerConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
