//! Object commands: put, cat, rm

use std::io::Write;

use anyhow::Context;
use bf_core::{Backend, Store};
use clap::Args;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Object name, relative to the store root
    pub name: String,

    /// File to upload, or `-` for stdin
    pub file: String,
}

#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object name, relative to the store root
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object name, relative to the store root
    pub name: String,
}

/// JSON output for put and rm
#[derive(Debug, Serialize)]
struct ObjectOperationOutput {
    success: bool,
    id: String,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

/// JSON output for cat
#[derive(Debug, Serialize)]
struct ContentOutput {
    id: String,
    size_bytes: u64,
    /// Content decoded as UTF-8, lossily
    content: String,
}

async fn read_input(file: &str) -> anyhow::Result<Vec<u8>> {
    if file == "-" {
        let mut data = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut data)
            .await
            .context("Failed to read stdin")?;
        return Ok(data);
    }

    tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {file}"))
}

pub async fn execute_put<B: Backend>(
    args: PutArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let id = match store.locate(&args.name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    let data = match read_input(&args.file).await {
        Ok(d) => d,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::GeneralError;
        }
    };
    let size = data.len() as u64;

    match store.set_object(&args.name, data).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ObjectOperationOutput {
                    success: true,
                    id: id.to_string(),
                    action: "written",
                    size_bytes: Some(size),
                });
            } else {
                let styled_name = formatter.style_name(id.as_str());
                let styled_size =
                    formatter.style_size(&humansize::format_size(size, humansize::BINARY));
                formatter.success(&format!("{styled_name} written ({styled_size})."));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}

pub async fn execute_cat<B: Backend>(
    args: CatArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let id = match store.locate(&args.name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    let Some(data) = store.get_object(&args.name).await else {
        formatter.error(&format!("Cannot read {id}: no such object"));
        return ExitCode::NotFound;
    };

    if formatter.is_json() {
        formatter.json(&ContentOutput {
            id: id.to_string(),
            size_bytes: data.len() as u64,
            content: String::from_utf8_lossy(&data).into_owned(),
        });
        return ExitCode::Success;
    }

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&data).and_then(|()| stdout.flush()) {
        formatter.error(&format!("Failed to write output: {e}"));
        return ExitCode::GeneralError;
    }
    ExitCode::Success
}

pub async fn execute_rm<B: Backend>(
    args: RmArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let id = match store.locate(&args.name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    match store.delete_object(&args.name).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ObjectOperationOutput {
                    success: true,
                    id: id.to_string(),
                    action: "removed",
                    size_bytes: None,
                });
            } else {
                let styled_name = formatter.style_name(id.as_str());
                formatter.success(&format!("{styled_name} removed."));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}
