//! Bucket commands: mb, rb, ls

use bf_core::{Backend, Entry, EntryKind, Store};
use clap::Args;
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket name, relative to the store root
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct RbArgs {
    /// Bucket name, relative to the store root
    pub name: String,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Bucket to list (the store root when omitted)
    pub name: Option<String>,
}

/// JSON output for bucket mutations
#[derive(Debug, Serialize)]
struct BucketOperationOutput {
    success: bool,
    id: String,
    action: &'static str,
}

/// JSON output for ls
#[derive(Debug, Serialize)]
struct ListOutput {
    bucket: String,
    entries: Vec<Entry>,
}

pub async fn execute_mb<B: Backend>(
    args: MbArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let name = args.name.unwrap_or_default();
    let id = match store.locate(&name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    match store.create_bucket(&name).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&BucketOperationOutput {
                    success: true,
                    id: id.to_string(),
                    action: "created",
                });
            } else {
                let styled = formatter.style_bucket(id.as_str());
                formatter.success(&format!("Bucket {styled} created."));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}

pub async fn execute_rb<B: Backend>(
    args: RbArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let id = match store.locate(&args.name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    match store.delete_bucket(&args.name).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&BucketOperationOutput {
                    success: true,
                    id: id.to_string(),
                    action: "removed",
                });
            } else {
                let styled = formatter.style_bucket(id.as_str());
                formatter.success(&format!("Bucket {styled} removed."));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}

pub async fn execute_ls<B: Backend>(
    args: LsArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let name = args.name.unwrap_or_default();
    let id = match store.locate(&name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    let Some(entries) = store.list_contents(&name).await else {
        formatter.error(&format!("Cannot list {id}: no such bucket"));
        return ExitCode::NotFound;
    };

    if formatter.is_json() {
        formatter.json(&ListOutput {
            bucket: id.to_string(),
            entries,
        });
        return ExitCode::Success;
    }

    for entry in &entries {
        formatter.println(&format_entry(entry, formatter));
    }
    ExitCode::Success
}

/// One `ls` line: size column, then the child's name
fn format_entry(entry: &Entry, formatter: &Formatter) -> String {
    let name = entry.id.name();
    match entry.kind {
        EntryKind::Bucket => {
            format!("{:>10}  {}", "-", formatter.style_bucket(&format!("{name}/")))
        }
        EntryKind::Object => {
            let size = humansize::format_size(entry.size_bytes.unwrap_or(0), humansize::BINARY);
            format!(
                "{}  {}",
                formatter.style_size(&format!("{size:>10}")),
                formatter.style_object(name)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputConfig;
    use bf_core::ResourceId;

    fn plain() -> Formatter {
        Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_format_entry() {
        let formatter = plain();
        let bucket = Entry::bucket(ResourceId::new("/data/reports"));
        assert_eq!(format_entry(&bucket, &formatter), "         -  reports/");

        let object = Entry::object(ResourceId::new("/data/a.txt"), 4);
        assert_eq!(format_entry(&object, &formatter), "       4 B  a.txt");
    }
}
