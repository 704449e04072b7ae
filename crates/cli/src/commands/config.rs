//! Configuration commands
//!
//! `config init` writes a configuration file for one backend; the store root
//! and identity come from the global `--root` and `--identity` flags.

use std::path::PathBuf;

use bf_core::{BackendConfig, Config, S3Config};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use super::SessionOptions;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a new configuration file
    Init(InitArgs),

    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Memory,
    Local,
    S3,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Storage backend
    #[arg(long, value_enum, default_value = "memory")]
    pub backend: BackendKind,

    /// Base directory (local backend)
    #[arg(long, required_if_eq("backend", "local"))]
    pub path: Option<PathBuf>,

    /// Endpoint URL (s3 backend)
    #[arg(long, required_if_eq("backend", "s3"))]
    pub endpoint: Option<String>,

    /// Access key ID (s3 backend)
    #[arg(long, env = "BF_ACCESS_KEY", required_if_eq("backend", "s3"))]
    pub access_key: Option<String>,

    /// Secret access key (s3 backend)
    #[arg(long, env = "BF_SECRET_KEY", hide_env_values = true, required_if_eq("backend", "s3"))]
    pub secret_key: Option<String>,

    /// Physical bucket holding the tree (s3 backend)
    #[arg(long, required_if_eq("backend", "s3"))]
    pub bucket: Option<String>,

    /// AWS region (s3 backend)
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket lookup style: auto, path, or dns (s3 backend)
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Configuration for JSON and TOML display, without the secret key
#[derive(Debug, Serialize)]
struct ConfigView {
    path: String,
    root: String,
    identity: String,
    backend: BackendView,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BackendView {
    Memory,
    Local {
        path: String,
    },
    S3 {
        endpoint: String,
        region: String,
        bucket: String,
        bucket_lookup: String,
        access_key: String,
    },
}

impl From<&BackendConfig> for BackendView {
    fn from(backend: &BackendConfig) -> Self {
        match backend {
            BackendConfig::Memory => BackendView::Memory,
            BackendConfig::Local { path } => BackendView::Local {
                path: path.display().to_string(),
            },
            BackendConfig::S3(s3) => BackendView::S3 {
                endpoint: s3.endpoint.clone(),
                region: s3.region.clone(),
                bucket: s3.bucket.clone(),
                bucket_lookup: s3.bucket_lookup.clone(),
                access_key: s3.access_key.clone(),
            },
        }
    }
}

/// Execute a config subcommand
pub async fn execute(
    cmd: ConfigCommands,
    session: SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match session.manager() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to locate configuration: {e}"));
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        ConfigCommands::Init(args) => execute_init(args, &session, &manager, &formatter),
        ConfigCommands::Show => match session.load() {
            Ok(config) => {
                show(&config, &manager.path().display().to_string(), &formatter);
                ExitCode::Success
            }
            Err(e) => {
                formatter.error(&format!("Failed to load configuration: {e}"));
                ExitCode::from_error(&e)
            }
        },
        ConfigCommands::Path => {
            let path = manager.path().display().to_string();
            if formatter.is_json() {
                formatter.json(&serde_json::json!({ "path": path }));
            } else {
                formatter.println(&path);
            }
            ExitCode::Success
        }
    }
}

fn build_backend(args: &InitArgs) -> Result<BackendConfig, String> {
    match args.backend {
        BackendKind::Memory => Ok(BackendConfig::Memory),
        BackendKind::Local => {
            let path = args.path.clone().ok_or("--path is required for the local backend")?;
            // Store an absolute path so the file works from any directory
            let path = std::path::absolute(&path)
                .map_err(|e| format!("Invalid path {}: {e}", path.display()))?;
            Ok(BackendConfig::Local { path })
        }
        BackendKind::S3 => {
            let require = |value: &Option<String>, flag: &str| {
                value
                    .clone()
                    .ok_or_else(|| format!("{flag} is required for the s3 backend"))
            };
            let mut s3 = S3Config::new(
                require(&args.endpoint, "--endpoint")?,
                require(&args.access_key, "--access-key")?,
                require(&args.secret_key, "--secret-key")?,
                require(&args.bucket, "--bucket")?,
            );
            s3.region = args.region.clone();
            s3.bucket_lookup = args.bucket_lookup.clone();
            Ok(BackendConfig::S3(s3))
        }
    }
}

fn execute_init(
    args: InitArgs,
    session: &SessionOptions,
    manager: &bf_core::ConfigManager,
    formatter: &Formatter,
) -> ExitCode {
    if manager.path().exists() && !args.force {
        formatter.error(&format!(
            "{} already exists; use --force to overwrite",
            manager.path().display()
        ));
        return ExitCode::UsageError;
    }

    let backend = match build_backend(&args) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let mut config = Config {
        backend,
        ..Default::default()
    };
    if let Some(root) = &session.root {
        config.store.root = root.clone();
    }
    if let Some(identity) = &session.identity {
        config.store.identity = identity.clone();
    }

    if let Err(e) = manager.save(&config) {
        formatter.error(&format!("Failed to save configuration: {e}"));
        return ExitCode::from_error(&e);
    }

    if formatter.is_json() {
        show(&config, &manager.path().display().to_string(), formatter);
    } else {
        if matches!(config.backend, BackendConfig::Memory) {
            formatter.warning("The memory backend keeps nothing between invocations.");
        }
        let styled_path = formatter.style_name(&manager.path().display().to_string());
        formatter.success(&format!(
            "Configuration written to {styled_path} ({} backend).",
            config.backend.name()
        ));
    }
    ExitCode::Success
}

fn show(config: &Config, path: &str, formatter: &Formatter) {
    let view = ConfigView {
        path: path.to_string(),
        root: config.store.root.clone(),
        identity: config.store.identity.clone(),
        backend: BackendView::from(&config.backend),
    };

    if formatter.is_json() {
        formatter.json(&view);
        return;
    }

    formatter.println(&format!("{} {}", formatter.style_key("Path:    "), view.path));
    formatter.println(&format!("{} {}", formatter.style_key("Root:    "), view.root));
    formatter.println(&format!("{} {}", formatter.style_key("Identity:"), view.identity));
    formatter.println(&format!(
        "{} {}",
        formatter.style_key("Backend: "),
        config.backend.name()
    ));
    match &view.backend {
        BackendView::Memory => {}
        BackendView::Local { path } => {
            formatter.println(&format!("{} {path}", formatter.style_key("Base:    ")));
        }
        BackendView::S3 {
            endpoint,
            region,
            bucket,
            bucket_lookup,
            access_key,
        } => {
            formatter.println(&format!("{} {endpoint}", formatter.style_key("Endpoint:")));
            formatter.println(&format!("{} {region}", formatter.style_key("Region:  ")));
            formatter.println(&format!(
                "{} {bucket} ({bucket_lookup})",
                formatter.style_key("Bucket:  ")
            ));
            formatter.println(&format!("{} {access_key}", formatter.style_key("Key:     ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_args(backend: BackendKind) -> InitArgs {
        InitArgs {
            backend,
            path: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            bucket: None,
            region: "us-east-1".to_string(),
            bucket_lookup: "auto".to_string(),
            force: false,
        }
    }

    #[test]
    fn test_build_memory_backend() {
        assert_eq!(
            build_backend(&init_args(BackendKind::Memory)).unwrap(),
            BackendConfig::Memory
        );
    }

    #[test]
    fn test_build_local_backend_requires_path() {
        assert!(build_backend(&init_args(BackendKind::Local)).is_err());

        let mut args = init_args(BackendKind::Local);
        args.path = Some(PathBuf::from("tree"));
        match build_backend(&args).unwrap() {
            BackendConfig::Local { path } => assert!(path.is_absolute()),
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_build_s3_backend() {
        let mut args = init_args(BackendKind::S3);
        assert!(build_backend(&args).is_err());

        args.endpoint = Some("http://localhost:9000".to_string());
        args.access_key = Some("ak".to_string());
        args.secret_key = Some("sk".to_string());
        args.bucket = Some("tree".to_string());
        args.bucket_lookup = "path".to_string();

        match build_backend(&args).unwrap() {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "tree");
                assert_eq!(s3.bucket_lookup, "path");
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_view_hides_secret_key() {
        let backend = BackendConfig::S3(S3Config::new("http://localhost:9000", "ak", "sk", "tree"));
        let json = serde_json::to_string(&BackendView::from(&backend)).unwrap();
        assert!(json.contains("\"type\":\"s3\""));
        assert!(json.contains("\"access_key\":\"ak\""));
        assert!(!json.contains("sk\""));
    }
}
