//! CLI entry point for the peerchat node.
//!
//! This binary provides a command-line interface for the chat library,
//! supporting identity generation, configuration management, and running a
//! node with an optional interactive console.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use peerchat::{
    crypto::{PeerIdentity, PeerPublicKey},
    utils::{ChatConfig, DEFAULT_CONFIG_FILE},
    Node,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

/// Peerchat - brokerless end-to-end encrypted peer-to-peer chat
#[derive(Parser)]
#[command(name = "peerchat")]
#[command(about = "A peer-to-peer chat node with encrypted direct and group messaging")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Data directory for storing keys
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and inspect the node identity
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Generate and inspect configuration files
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Run a chat node
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Pre-register a peer address, as id=host:port (repeatable)
        #[arg(long, value_name = "ID=ADDR")]
        peer: Vec<String>,
        /// Pre-register a peer public key, as id=base64 (repeatable)
        #[arg(long, value_name = "ID=KEY")]
        key: Vec<String>,
        /// Read console commands from stdin
        #[arg(short, long)]
        interactive: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new identity key pair
    Generate {
        /// Peer id for the identity
        #[arg(short, long)]
        id: String,
        /// Force overwrite of an existing identity
        #[arg(short, long)]
        force: bool,
    },
    /// Display the public key for out-of-band exchange
    Show {
        /// Output format (base64, hex, json)
        #[arg(short, long, default_value = "base64")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Generate {
        /// Force overwrite of an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = ChatConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.keys_dir = data_dir.join("keys");
        config.storage.data_dir = data_dir;
    }

    match cli.command {
        Commands::Keys { action } => handle_key_commands(action, &config),
        Commands::Config { action } => handle_config_commands(action, &config),
        Commands::Run {
            port,
            peer,
            key,
            interactive,
        } => handle_run_command(port, peer, key, interactive, config).await,
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn handle_key_commands(action: KeyCommands, config: &ChatConfig) -> Result<()> {
    match action {
        KeyCommands::Generate { id, force } => {
            let keys_dir = &config.storage.keys_dir;
            if PeerIdentity::exists(keys_dir) && !force {
                return Err(anyhow::anyhow!(
                    "Identity already exists. Use --force to overwrite."
                ));
            }

            config.ensure_directories()?;
            info!("Generating new identity for '{id}'");
            let identity = PeerIdentity::generate(id);
            identity.save(keys_dir)?;

            println!("✓ Identity generated successfully");
            println!("  Id: {}", identity.id());
            println!("  Public key: {}", identity.public_key().to_base64());
            println!("  Saved to: {}", keys_dir.display());
        }
        KeyCommands::Show { format } => {
            let identity = PeerIdentity::load(&config.storage.keys_dir)?;
            let public_key = identity.public_key();

            match format.as_str() {
                "base64" => println!("{}", public_key.to_base64()),
                "hex" => println!("{}", hex::encode(public_key.as_bytes())),
                "json" => println!("{}", identity.public_identity().to_json()?),
                _ => return Err(anyhow::anyhow!("Unsupported format: {format}")),
            }
        }
    }
    Ok(())
}

fn handle_config_commands(action: ConfigCommands, config: &ChatConfig) -> Result<()> {
    match action {
        ConfigCommands::Generate { force } => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() && !force {
                return Err(anyhow::anyhow!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                ));
            }

            ChatConfig::default().save(&path)?;
            println!("✓ Configuration generated: {}", path.display());
        }
        ConfigCommands::Show => {
            println!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

async fn handle_run_command(
    port: Option<u16>,
    peers: Vec<String>,
    keys: Vec<String>,
    interactive: bool,
    mut config: ChatConfig,
) -> Result<()> {
    if let Some(port) = port {
        config.network.listen_port = port;
    }
    config.validate()?;
    config.ensure_directories()?;

    let identity = load_or_create_identity(&config)?;
    let mut node = Node::new(identity, config);
    let addr = node.start().await?;
    let node = Arc::new(node);

    for entry in peers {
        let (id, value) = split_pair(&entry)?;
        let peer_addr: SocketAddr = value.parse()?;
        node.register_peer(id, peer_addr).await;
    }
    for entry in keys {
        let (id, value) = split_pair(&entry)?;
        node.remember_public_key(id, PeerPublicKey::from_base64(value)?)
            .await;
    }

    println!("Peerchat node '{}' listening on {addr}", node.id());
    println!("Public key: {}", node.public_key().to_base64());

    if interactive {
        run_console(node).await
    } else {
        let mut events = node.subscribe().await;
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                println!(
                    "[{}] {}: {}",
                    event.conversation_id, event.message.sender, event.message.body
                );
            }
        });

        signal::ctrl_c().await?;
        info!("Shutdown signal received");
        printer.abort();
        Ok(())
    }
}

/// Load the persisted identity from the keys directory, generating one named
/// after the current user if none exists yet
fn load_or_create_identity(config: &ChatConfig) -> Result<PeerIdentity> {
    let keys_dir = &config.storage.keys_dir;

    if PeerIdentity::exists(keys_dir) {
        let identity = PeerIdentity::load(keys_dir)?;
        info!("Loaded identity {}", identity.id());
        return Ok(identity);
    }

    let id = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| format!("peer-{}", uuid::Uuid::new_v4()));
    info!("No identity found, generating one for '{id}'");

    let identity = PeerIdentity::generate(id);
    identity.save(keys_dir)?;
    Ok(identity)
}

/// Split an `id=value` command-line entry
fn split_pair(entry: &str) -> Result<(&str, &str)> {
    entry
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected id=value, got '{entry}'"))
}

async fn run_console(node: Arc<Node>) -> Result<()> {
    let mut events = node.subscribe().await;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!(
                "[{}] {}: {}",
                event.conversation_id, event.message.sender, event.message.body
            );
        }
    });

    println!("Console ready. Commands: /register /key /send /gsend /history /peers /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = dispatch_console_command(&node, line).await {
            eprintln!("error: {e}");
        }
    }

    printer.abort();
    Ok(())
}

async fn dispatch_console_command(node: &Node, line: &str) -> Result<()> {
    let mut parts = line.splitn(3, ' ');
    let verb = parts.next().unwrap_or("");

    match verb {
        "/register" => {
            let id = require(parts.next(), "/register <peer-id> <host:port>")?;
            let addr = require(parts.next(), "/register <peer-id> <host:port>")?;
            node.register_peer(id, addr.parse::<SocketAddr>()?).await;
            println!("✓ Registered {id} at {addr}");
        }
        "/key" => {
            let id = require(parts.next(), "/key <peer-id> <base64>")?;
            let encoded = require(parts.next(), "/key <peer-id> <base64>")?;
            node.remember_public_key(id, PeerPublicKey::from_base64(encoded)?)
                .await;
            println!("✓ Remembered public key for {id}");
        }
        "/send" => {
            let id = require(parts.next(), "/send <peer-id> <text>")?;
            let text = require(parts.next(), "/send <peer-id> <text>")?;
            node.send_direct(id, text).await?;
        }
        "/gsend" => {
            let id = require(parts.next(), "/gsend <group-id> <text-or-member-list>")?;
            let text = require(parts.next(), "/gsend <group-id> <text-or-member-list>")?;
            node.send_group(id, text).await?;
        }
        "/history" => {
            let id = require(parts.next(), "/history <conversation-id>")?;
            for message in node.messages(id).await {
                println!(
                    "{} {}: {}",
                    message.timestamp.format("%H:%M:%S"),
                    message.sender,
                    message.body
                );
            }
        }
        "/peers" => {
            for (id, addr) in node.known_peers().await {
                println!("{id} {addr}");
            }
        }
        _ => println!("Unknown command: {verb}"),
    }
    Ok(())
}

fn require<'a>(part: Option<&'a str>, usage: &str) -> Result<&'a str> {
    part.ok_or_else(|| anyhow::anyhow!("usage: {usage}"))
}
