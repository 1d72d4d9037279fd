use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cortex_mcp::store::{SqliteStore, Store};
use cortex_mcp::{logging, server, ServerConfig, TransportKind};

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "MCP server for an embedded SQL database", long_about = None)]
struct Cli {
    /// Log at debug level (overrides CORTEX_LOG / RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the database over the selected transport(s)
    Serve(ServeArgs),

    /// Print the tool catalogue as JSON
    Tools,

    /// Show version information
    Version {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// SQLite database file (created if missing)
    #[arg(long, required_unless_present = "memory", conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long)]
    memory: bool,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport(s) to start
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// Interface to bind network transports to
    #[arg(long)]
    host: Option<String>,

    /// HTTP port (WebSocket uses port + 1 with --transport all)
    #[arg(short, long)]
    port: Option<u16>,

    /// Require this key in the x-api-key header
    #[arg(long)]
    api_key: Option<String>,

    /// Seconds between SSE ping events
    #[arg(long)]
    sse_keepalive_secs: Option<u64>,
}

impl ServeArgs {
    /// CLI flags sit on top of file and environment settings
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref key) = self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(secs) = self.sse_keepalive_secs {
            config.sse_keepalive = Duration::from_secs(secs);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Serve(args) => serve(args),
        Commands::Tools => {
            let tools = cortex_mcp::mcp::list_tools();
            println!("{}", serde_json::to_string_pretty(&tools)?);
            Ok(())
        }
        Commands::Version { json } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                        "protocol": cortex_mcp::mcp::PROTOCOL_VERSION
                    })
                );
            } else {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            }
            Ok(())
        }
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let store = match args.db {
        Some(ref path) => SqliteStore::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?,
        None => SqliteStore::open_in_memory().context("Failed to create in-memory database")?,
    };
    let store: Arc<dyn Store> = Arc::new(store);

    let running = server::start(&config, Arc::clone(&store))?;
    running.wait();

    store.close().context("Failed to close database")?;
    Ok(())
}
