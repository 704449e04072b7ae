//! Command implementations
//!
//! Store commands are generic over the backend; [`execute`] picks the
//! backend named by the configuration and opens the store once.

use std::path::PathBuf;

use bf_core::{
    Backend, BackendConfig, Client, Config, ConfigManager, Error, LocalBackend, MemoryBackend,
    Store,
};
use bf_s3::S3Backend;
use clap::Subcommand;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod bucket;
pub mod completions;
pub mod config;
pub mod object;
pub mod stat;

/// Commands that operate on the store
#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// Create a bucket (the store root when NAME is omitted)
    Mb(bucket::MbArgs),

    /// Remove an empty bucket
    Rb(bucket::RbArgs),

    /// List the contents of a bucket
    Ls(bucket::LsArgs),

    /// Write an object from a file or stdin
    Put(object::PutArgs),

    /// Write an object's content to stdout
    Cat(object::CatArgs),

    /// Remove an object
    Rm(object::RmArgs),

    /// Show what a name refers to
    Stat(stat::StatArgs),
}

/// Session settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub config_dir: Option<PathBuf>,
    pub root: Option<String>,
    pub identity: Option<String>,
}

impl SessionOptions {
    pub fn manager(&self) -> bf_core::Result<ConfigManager> {
        match &self.config_dir {
            Some(dir) => Ok(ConfigManager::in_dir(dir)),
            None => ConfigManager::new(),
        }
    }

    /// Load the configuration file and apply command line overrides
    pub fn load(&self) -> bf_core::Result<Config> {
        let mut config = self.manager()?.load()?;
        if let Some(root) = &self.root {
            config.store.root = root.clone();
        }
        if let Some(identity) = &self.identity {
            config.store.identity = identity.clone();
        }
        Ok(config)
    }
}

/// Print `error` and map it to an exit code
pub(crate) fn report(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from_error(error)
}

/// Execute a store command
pub async fn execute(
    command: StoreCommand,
    session: SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match session.load() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    tracing::debug!(
        backend = config.backend.name(),
        root = %config.store.root,
        identity = %config.store.identity,
        "Opening store"
    );

    match &config.backend {
        BackendConfig::Memory => run(command, MemoryBackend::new(), &config, &formatter).await,
        BackendConfig::Local { path } => match LocalBackend::open(path).await {
            Ok(backend) => run(command, backend, &config, &formatter).await,
            Err(e) => {
                formatter.error(&format!("Failed to open {}: {e}", path.display()));
                ExitCode::BackendError
            }
        },
        BackendConfig::S3(s3) => {
            let backend = match S3Backend::new(s3, config.retry.clone()).await {
                Ok(b) => b,
                Err(e) => {
                    formatter.error(&format!("Failed to create S3 client: {e}"));
                    return ExitCode::BackendError;
                }
            };
            if let Err(e) = backend.ensure_bucket().await {
                formatter.error(&format!("Failed to access bucket '{}': {e}", s3.bucket));
                return ExitCode::BackendError;
            }
            run(command, backend, &config, &formatter).await
        }
    }
}

async fn run<B: Backend>(
    command: StoreCommand,
    backend: B,
    config: &Config,
    formatter: &Formatter,
) -> ExitCode {
    let store = match Store::builder(backend)
        .root(config.store.root.as_str())
        .client(Client::new(config.store.identity.as_str()))
        .build()
        .await
    {
        Ok(s) => s,
        Err(e) => return report(formatter, &e),
    };

    match command {
        StoreCommand::Mb(args) => bucket::execute_mb(args, &store, formatter).await,
        StoreCommand::Rb(args) => bucket::execute_rb(args, &store, formatter).await,
        StoreCommand::Ls(args) => bucket::execute_ls(args, &store, formatter).await,
        StoreCommand::Put(args) => object::execute_put(args, &store, formatter).await,
        StoreCommand::Cat(args) => object::execute_cat(args, &store, formatter).await,
        StoreCommand::Rm(args) => object::execute_rm(args, &store, formatter).await,
        StoreCommand::Stat(args) => stat::execute(args, &store, formatter).await,
    }
}
