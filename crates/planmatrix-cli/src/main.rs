use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "planmatrix", version, about = "Planmatrix CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full sync cycle against the configured calendar
    Sync,
    /// Check the table for invalid rows without touching anything
    Validate,
    /// Archive management
    Archive {
        #[command(subcommand)]
        action: commands::archive::ArchiveAction,
    },
    /// Google authentication
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthOp,
    },
    /// Row counts by sync state
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sync => commands::sync::run(),
        Commands::Validate => commands::validate::run(),
        Commands::Archive { action } => commands::archive::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Status { json } => commands::status::run(json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
