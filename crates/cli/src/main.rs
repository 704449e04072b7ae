//! bf - command line access to a root-confined bucket/object store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod commands;
mod exit_code;
mod output;

use commands::SessionOptions;
use output::{Formatter, OutputConfig};

/// Environment variable holding the log filter
const LOG_ENV: &str = "BF_LOG";

/// Root-confined bucket and object storage
#[derive(Parser, Debug)]
#[command(name = "bf", author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, env = "BF_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Store root, overriding the configuration
    #[arg(long, global = true)]
    root: Option<String>,

    /// Client identity, overriding the configuration
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Store(commands::StoreCommand),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

fn init_tracing(debug: bool, quiet: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else if quiet {
        LevelFilter::ERROR
    } else {
        LevelFilter::WARN
    };

    let env_filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.quiet);

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };
    if !Formatter::new(output_config).colors_enabled() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    let session = SessionOptions {
        config_dir: cli.config_dir,
        root: cli.root,
        identity: cli.identity,
    };

    let code = match cli.command {
        Commands::Store(cmd) => commands::execute(cmd, session, output_config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, session, output_config).await,
        Commands::Completions(args) => commands::completions::execute(args),
    };

    code.into()
}
