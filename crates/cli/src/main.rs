//! Tutorly CLI: the main entry point.
//!
//! Commands:
//! - `serve`:  Start the HTTP gateway
//! - `ask`:    Answer one question without the HTTP layer
//! - `config`: Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use tutorly_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorly",
    about = "Tutorly: grounded answers for students",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        query: String,

        /// Restrict retrieval to a subject
        #[arg(short, long)]
        subject: Option<String>,

        /// Restrict retrieval to a grade
        #[arg(short, long)]
        grade: Option<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
    /// Load and validate the configuration
    Validate,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let json_logs = cli.json_logs
        || AppConfig::load()
            .map(|c| c.logging.format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
    init_tracing(cli.verbose, json_logs);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            query,
            subject,
            grade,
            json,
        } => commands::ask::run(query, subject, grade, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
