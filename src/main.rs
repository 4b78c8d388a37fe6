use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use spooldesk::config::Config;
use spooldesk::store::db::TicketDb;

#[derive(Parser)]
#[command(name = "spooldesk")]
#[command(version, about = "Internal ticketing service for 3D-printing material requests")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file (defaults to ./spooldesk.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to serve on (overrides the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// Initialize the database and exit
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, dev } => {
            if let Some(port) = port {
                config.port = port;
            }
            if dev {
                config.dev_mode = true;
            }
            spooldesk::server::start_server(config).await?;
        }
        Commands::Init => {
            if let Some(parent) = config.db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            TicketDb::new(&config.db_path)?;
            println!("Database initialized at {}", config.db_path.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
