/// Which processes to show: CLI names or config defaults, checked against
/// the logs present on disk.
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Where the requested names came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Cli,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSelection {
    pub source: SelectionSource,
    /// Requested names with a log file, in request order.
    pub selected: Vec<String>,
    /// Requested names with no log file yet.
    pub ignored: Vec<String>,
    /// Every process with a log file, sorted.
    pub available: Vec<String>,
}

impl ProcessSelection {
    /// Replace the selection with an explicit choice from the UI.
    ///
    /// Names without a log file are dropped. `ignored` still describes the
    /// original request.
    pub fn with_override(mut self, names: &[String]) -> Self {
        let available: HashSet<&str> = self.available.iter().map(String::as_str).collect();
        self.selected = dedup(names)
            .into_iter()
            .filter(|n| available.contains(n.as_str()))
            .collect();
        self
    }
}

/// Names of the `*.json` logs in `log_dir`.
pub fn available_logs(log_dir: &Path) -> BTreeSet<String> {
    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %log_dir.display(),
                "failed to list log directory"
            );
            return BTreeSet::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let stem = name.strip_suffix(".json")?;
            (!stem.is_empty()).then(|| stem.to_string())
        })
        .collect()
}

/// Resolve the monitored processes.
///
/// Non-empty `cli_args` replace `config_defaults` entirely.
pub fn resolve(
    cli_args: &[String],
    config_defaults: &[String],
    available_logs: &BTreeSet<String>,
) -> ProcessSelection {
    let (source, requested) = if cli_args.is_empty() {
        (SelectionSource::Config, config_defaults)
    } else {
        (SelectionSource::Cli, cli_args)
    };

    let (selected, ignored): (Vec<String>, Vec<String>) = dedup(requested)
        .into_iter()
        .partition(|name| available_logs.contains(name));

    ProcessSelection {
        source,
        selected,
        ignored,
        available: available_logs.iter().cloned().collect(),
    }
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}
