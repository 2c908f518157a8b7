use clap::{Parser, Subcommand};
use discovery_core::Config;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "discovery", version, about = "Daily Discovery CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch today's queue and print a summary as JSON
    Today {
        /// Use the built-in offline demo server
        #[arg(long)]
        demo: bool,
    },
    /// Interactive discovery session
    Run {
        /// Use the built-in offline demo server
        #[arg(long)]
        demo: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Access token management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

/// Logs go to stderr; `RUST_LOG` wins over the configured level.
fn init_tracing() {
    let level = Config::load_or_default().logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Today { demo } => commands::session::today(demo).await,
        Commands::Run { demo } => commands::session::run(demo).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
