mod cmd;
mod http;
mod output;

use clap::{Parser, Subcommand};
use cmd::{job::JobSubcommand, templates::TemplatesSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "weaver",
    about = "Network fabric provisioning orchestrator — validate, plan, and run provisioning jobs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Base URL of a running weaver server (for job/stats/templates commands)
    #[arg(
        long,
        global = true,
        env = "WEAVER_SERVER",
        default_value = "http://localhost:8080"
    )]
    server: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provisioning server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Path to the job database
        #[arg(long, default_value = "weaver.redb")]
        db: PathBuf,

        /// Allowed site code (repeatable; defaults to the built-in list)
        #[arg(long = "allow-site")]
        allow_sites: Vec<String>,
    },

    /// Validate a fabric configuration file (offline)
    Validate {
        /// Configuration file (.yaml, .yml, or .json)
        file: PathBuf,

        /// Allowed site code (repeatable; defaults to the built-in list)
        #[arg(long = "allow-site")]
        allow_sites: Vec<String>,
    },

    /// Show the ordered task plan for a configuration file (offline)
    Plan {
        /// Configuration file (.yaml, .yml, or .json)
        file: PathBuf,

        /// Allowed site code (repeatable; defaults to the built-in list)
        #[arg(long = "allow-site")]
        allow_sites: Vec<String>,
    },

    /// Manage provisioning jobs on a running server
    Job {
        #[command(subcommand)]
        subcommand: JobSubcommand,
    },

    /// Show job statistics from a running server
    Stats,

    /// List and inspect configuration templates
    Templates {
        #[command(subcommand)]
        subcommand: TemplatesSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve {
            port,
            db,
            allow_sites,
        } => cmd::serve::run(port, db, allow_sites),
        Commands::Validate { file, allow_sites } => cmd::validate::run(&file, allow_sites, cli.json),
        Commands::Plan { file, allow_sites } => cmd::plan::run(&file, allow_sites, cli.json),
        Commands::Job { subcommand } => cmd::job::run(&cli.server, subcommand, cli.json),
        Commands::Stats => cmd::stats::run(&cli.server, cli.json),
        Commands::Templates { subcommand } => {
            cmd::templates::run(&cli.server, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
