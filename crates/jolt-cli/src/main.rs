use clap::{Parser, Subcommand};

mod adapters;
mod commands;

#[derive(Parser)]
#[command(name = "jolt-cli", version, about = "Jolt accident detection CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a phone number is an accepted mobile number
    Validate {
        /// Number to check; spaces and dashes are ignored
        number: String,
    },
    /// Emergency contact management
    Contacts {
        #[command(subcommand)]
        action: commands::contacts::ContactsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Classify a single reading
    Classify(commands::classify::ClassifyArgs),
    /// Run a monitoring session over recorded samples
    Monitor(commands::monitor::MonitorArgs),
    /// Recent escalation cycles
    History {
        /// Maximum number of cycles to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Validate { number } => commands::validate::run(&number),
        Commands::Contacts { action } => commands::contacts::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Classify(args) => commands::classify::run(args),
        Commands::Monitor(args) => commands::monitor::run(args),
        Commands::History { limit } => commands::history::run(limit),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
