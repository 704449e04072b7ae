//! stat command - report what a name refers to

use bf_core::{Backend, EntryKind, Store};
use clap::Args;
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Name relative to the store root (the root when omitted)
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    id: String,
    /// `None` when nothing exists under the name
    kind: Option<EntryKind>,
    local: bool,
    identity: String,
}

pub async fn execute<B: Backend>(
    args: StatArgs,
    store: &Store<B>,
    formatter: &Formatter,
) -> ExitCode {
    let name = args.name.unwrap_or_default();
    let id = match store.locate(&name) {
        Ok(id) => id,
        Err(e) => return report(formatter, &e),
    };

    let kind = if store.is_bucket(&name).await {
        Some(EntryKind::Bucket)
    } else if store.is_object(&name).await {
        Some(EntryKind::Object)
    } else {
        None
    };

    let output = StatOutput {
        id: id.to_string(),
        kind,
        local: store.is_local(),
        identity: store.client().identity().to_string(),
    };

    if formatter.is_json() {
        formatter.json(&output);
    } else if !formatter.is_quiet() {
        let kind = output.kind.map_or("missing".to_string(), |k| k.to_string());
        formatter.println(&format!(
            "{} {}",
            formatter.style_key("Id:      "),
            formatter.style_name(&output.id)
        ));
        formatter.println(&format!("{} {kind}", formatter.style_key("Kind:    ")));
        formatter.println(&format!("{} {}", formatter.style_key("Local:   "), output.local));
        formatter.println(&format!("{} {}", formatter.style_key("Identity:"), output.identity));
    }

    if output.kind.is_some() {
        ExitCode::Success
    } else {
        ExitCode::NotFound
    }
}
