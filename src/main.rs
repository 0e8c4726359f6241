use anyhow::Result;
use clap::{Parser, Subcommand};
use dbpatcher::catalog::VersionCatalog;
use dbpatcher::commands::{self, MigrateOptions};
use dbpatcher::config::{self, ConfigBuilder, ConfigInput};
use dotenv::dotenv;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct StatusArgs {
    #[command(flatten)]
    database_args: config::DatabaseArgs,
}

#[derive(Parser)]
struct MigrateArgs {
    /// Version to update the database to (see `dbpatcher list`)
    #[arg(long)]
    to: String,

    /// Show the releases that would be applied without applying them
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    credential_args: config::CredentialArgs,

    #[command(flatten)]
    database_args: config::DatabaseArgs,

    #[command(flatten)]
    patcher_args: config::PatcherArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// List the releases this patcher can apply
    List,
    /// Show the database version and the releases still to apply
    Status(StatusArgs),
    /// Update the database to a given release
    Migrate(MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);
    run_main(cli).await
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_main(cli: Cli) -> Result<()> {
    let catalog = VersionCatalog::highlander()?;

    match cli.command {
        Commands::List => commands::cmd_list(&catalog),
        Commands::Status(args) => {
            let cli_config = ConfigInput {
                database: Some(args.database_args.into()),
                ..Default::default()
            };
            let config = resolve_config(&cli.config_file, cli_config)?;
            commands::cmd_status(&config, catalog).await
        }
        Commands::Migrate(args) => {
            let mut cli_config: ConfigInput = args.patcher_args.into();
            cli_config.database = Some(args.database_args.into());
            cli_config.credentials = Some(args.credential_args.into());
            let config = resolve_config(&cli.config_file, cli_config)?;

            let options = MigrateOptions {
                target: args.to,
                dry_run: args.dry_run,
            };
            commands::cmd_migrate(&config, catalog, &options).await
        }
    }
}

fn resolve_config(config_file: &str, cli_config: ConfigInput) -> Result<config::Config> {
    let file_config = config::load_config(config_file)?;
    let config = ConfigBuilder::new()
        .with_file(file_config)
        .with_env(ConfigInput::from_env())
        .with_cli_args(cli_config)
        .resolve()?;
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}
