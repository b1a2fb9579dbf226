use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use folio::cli::setup::setup;
use folio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the REST API server
    Serve,
    /// Manage users
    #[command(subcommand)]
    User(UserCommands),
    /// Display a user's portfolio summary
    Summary {
        /// Email of the user whose assets are summarized
        #[arg(long)]
        email: String,
        /// Display currency (defaults to the configured currency)
        #[arg(long)]
        currency: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user and print a session token
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Sign-in provider to link, e.g. github
        #[arg(long)]
        provider: Option<String>,
        /// Account id at the provider (defaults to the email)
        #[arg(long, requires = "provider")]
        provider_account_id: Option<String>,
    },
    /// List users
    List,
}

impl From<Commands> for folio::AppCommand {
    fn from(cmd: Commands) -> folio::AppCommand {
        match cmd {
            Commands::Serve => folio::AppCommand::Serve,
            Commands::Summary { email, currency } => folio::AppCommand::Summary { email, currency },
            Commands::User(UserCommands::Add {
                name,
                email,
                provider,
                provider_account_id,
            }) => folio::AppCommand::UserAdd {
                name,
                email,
                provider,
                provider_account_id,
            },
            Commands::User(UserCommands::List) => folio::AppCommand::UserList,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => folio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
