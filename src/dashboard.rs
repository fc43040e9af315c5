/// One refresh cycle: config → selection → aggregation → series.
///
/// `compute_dashboard_state` never fails. Every problem degrades to a
/// neutral view that the UI renders as an info or warning panel.
use crate::aggregate::{self, Aggregate, SkippedLines};
use crate::cache::TtlCache;
use crate::config::{self, DashboardSettings};
use crate::record::LogRecord;
use crate::selection::{self, ProcessSelection};
use crate::series::{self, SeriesPoint, Totals};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Inputs that stay fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct DashboardInputs {
    pub config_path: PathBuf,
    pub cli_processes: Vec<String>,
}

/// Outcome of one config load, cached as-is (failures included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub log_directory: Option<PathBuf>,
    pub default_process_names: Vec<String>,
    pub error: Option<String>,
}

/// The TTL caches owned by the refresh pipeline.
#[derive(Debug)]
pub struct DashboardCaches {
    pub config: TtlCache<PathBuf, ConfigSnapshot>,
    pub logs: TtlCache<(PathBuf, Vec<String>), Aggregate>,
}

impl DashboardCaches {
    pub fn new(config_ttl: Duration, log_ttl: Duration) -> Self {
        Self {
            config: TtlCache::new(config_ttl),
            logs: TtlCache::new(log_ttl),
        }
    }

    pub fn from_settings(settings: &DashboardSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.config_ttl_secs),
            Duration::from_secs(settings.log_ttl_secs),
        )
    }
}

/// Everything the UI renders for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub generated_at: DateTime<Utc>,
    pub config_error: Option<String>,
    pub selection: Option<ProcessSelection>,
    pub view: View,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    /// No usable log directory; the dashboard cannot show anything.
    NoLogDirectory,
    /// Nothing selected.
    NoSelection,
    /// Processes selected but no records yet.
    Waiting { processes: Vec<String> },
    Data {
        totals: Totals,
        series: Vec<SeriesPoint>,
        raw: Vec<LogRecord>,
        skipped: SkippedLines,
    },
}

/// Load the config, or the cached copy if it is still fresh.
fn cached_config(caches: &mut DashboardCaches, path: &Path, now: Instant) -> ConfigSnapshot {
    caches
        .config
        .get_or_insert_with(path.to_path_buf(), now, || match config::load_config(path) {
            Ok(cfg) => ConfigSnapshot {
                log_directory: cfg.log_directory,
                default_process_names: cfg.default_process_names,
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "config unavailable");
                ConfigSnapshot {
                    error: Some(e.to_string()),
                    ..ConfigSnapshot::default()
                }
            }
        })
}

/// Compute the dashboard for the default selection, or for `selection_override`
/// when the UI asks for a specific set of processes.
pub fn compute_dashboard_state(
    inputs: &DashboardInputs,
    selection_override: Option<&[String]>,
    caches: &mut DashboardCaches,
    now: Instant,
) -> DashboardState {
    let generated_at = Utc::now();
    let cfg = cached_config(caches, &inputs.config_path, now);

    let log_dir = match cfg.log_directory {
        Some(dir) => dir,
        None => {
            return DashboardState {
                generated_at,
                config_error: cfg.error,
                selection: None,
                view: View::NoLogDirectory,
            }
        }
    };

    let available = selection::available_logs(&log_dir);
    let mut sel = selection::resolve(&inputs.cli_processes, &cfg.default_process_names, &available);
    if let Some(names) = selection_override {
        sel = sel.with_override(names);
    }

    if sel.selected.is_empty() {
        return DashboardState {
            generated_at,
            config_error: cfg.error,
            selection: Some(sel),
            view: View::NoSelection,
        };
    }

    let key = (log_dir, sel.selected.clone());
    let agg = caches.logs.get_or_insert_with(key.clone(), now, || {
        let agg = aggregate::aggregate(key.1.as_slice(), &key.0);
        tracing::debug!(
            records = agg.records.len(),
            skipped = agg.skipped.total(),
            "aggregated process logs"
        );
        agg
    });

    let view = if agg.records.is_empty() {
        View::Waiting {
            processes: sel.selected.clone(),
        }
    } else {
        let series = series::build_series(agg.records);
        View::Data {
            totals: series::totals(&series),
            raw: series::raw_table(&series),
            series,
            skipped: agg.skipped,
        }
    };

    DashboardState {
        generated_at,
        config_error: cfg.error,
        selection: Some(sel),
        view,
    }
}

/// Inputs and caches for the refresh loop.
///
/// Runs are serialized by whoever owns the pipeline; it is never shared
/// without a lock.
#[derive(Debug)]
pub struct Pipeline {
    inputs: DashboardInputs,
    caches: DashboardCaches,
}

impl Pipeline {
    pub fn new(inputs: DashboardInputs, caches: DashboardCaches) -> Self {
        Self { inputs, caches }
    }

    pub fn compute(&mut self, selection_override: Option<&[String]>) -> DashboardState {
        compute_dashboard_state(
            &self.inputs,
            selection_override,
            &mut self.caches,
            Instant::now(),
        )
    }
}

impl View {
    pub fn kind(&self) -> &'static str {
        match self {
            View::NoLogDirectory => "no_log_directory",
            View::NoSelection => "no_selection",
            View::Waiting { .. } => "waiting",
            View::Data { .. } => "data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Status;
    use crate::selection::SelectionSource;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        inputs: DashboardInputs,
    }

    impl Fixture {
        fn new(names: &[&str], cli: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            let logs = dir.path().join("logs");
            std::fs::create_dir(&logs).unwrap();
            let config_path = dir.path().join("config.toml");
            let names_toml: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
            std::fs::write(
                &config_path,
                format!(
                    "[output_path]\nlogs = \"{}\"\n\n[process_dashboard]\nnames = [{}]\n",
                    logs.display(),
                    names_toml.join(", ")
                ),
            )
            .unwrap();
            Self {
                dir,
                inputs: DashboardInputs {
                    config_path,
                    cli_processes: cli.iter().map(|s| s.to_string()).collect(),
                },
            }
        }

        fn write_log(&self, process: &str, contents: &str) {
            std::fs::write(
                self.dir.path().join("logs").join(format!("{process}.json")),
                contents,
            )
            .unwrap();
        }
    }

    fn caches() -> DashboardCaches {
        DashboardCaches::new(Duration::from_secs(30), Duration::from_secs(5))
    }

    #[test]
    fn config_error_degrades_to_no_log_directory() {
        let inputs = DashboardInputs {
            config_path: PathBuf::from("/nonexistent/config.toml"),
            cli_processes: vec![],
        };
        let state = compute_dashboard_state(&inputs, None, &mut caches(), Instant::now());
        assert!(matches!(state.view, View::NoLogDirectory));
        assert!(state.selection.is_none());
        assert!(state
            .config_error
            .unwrap()
            .contains("/nonexistent/config.toml"));
    }

    #[test]
    fn empty_selection_is_neutral() {
        let fx = Fixture::new(&[], &[]);
        fx.write_log("svc", "");
        let state = compute_dashboard_state(&fx.inputs, None, &mut caches(), Instant::now());
        assert!(matches!(state.view, View::NoSelection));
        assert!(state.config_error.is_none());
        assert_eq!(state.selection.unwrap().available, vec!["svc"]);
    }

    #[test]
    fn empty_logs_mean_waiting() {
        let fx = Fixture::new(&["svc"], &[]);
        fx.write_log("svc", "\n{\"partial\":");
        let state = compute_dashboard_state(&fx.inputs, None, &mut caches(), Instant::now());
        match state.view {
            View::Waiting { processes } => assert_eq!(processes, vec!["svc"]),
            other => panic!("expected waiting, got {other:?}"),
        }
    }

    #[test]
    fn data_view_has_totals_series_and_raw() {
        let fx = Fixture::new(&["svc3"], &["svc1", "svc2"]);
        fx.write_log(
            "svc1",
            concat!(
                "{\"timestamp\":\"2024-01-01T00:00:02Z\",\"exit_code\":1}\n",
                "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"exit_code\":0}\n",
            ),
        );
        fx.write_log(
            "svc3",
            "{\"timestamp\":\"2024-01-01T00:00:01Z\",\"exit_code\":0}\n",
        );

        let state = compute_dashboard_state(&fx.inputs, None, &mut caches(), Instant::now());
        let sel = state.selection.unwrap();
        assert_eq!(sel.source, SelectionSource::Cli);
        assert_eq!(sel.selected, vec!["svc1"]);
        assert_eq!(sel.ignored, vec!["svc2"]);

        match state.view {
            View::Data {
                totals,
                series,
                raw,
                skipped,
            } => {
                assert_eq!(
                    totals,
                    Totals {
                        successes: 1,
                        failures: 1,
                        runs: 2
                    }
                );
                assert_eq!(series[0].status, Status::Success);
                assert_eq!(series[1].failure_count, 1);
                assert_eq!(raw[0].status, Status::Failure);
                assert_eq!(skipped.total(), 0);
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn override_selects_other_processes() {
        let fx = Fixture::new(&["a"], &[]);
        fx.write_log("a", "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"exit_code\":0}\n");
        fx.write_log("b", "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"exit_code\":1}\n");

        let over = vec!["b".to_string()];
        let state = compute_dashboard_state(
            &fx.inputs,
            Some(over.as_slice()),
            &mut caches(),
            Instant::now(),
        );
        match state.view {
            View::Data { totals, .. } => assert_eq!(totals.failures, 1),
            other => panic!("expected data, got {other:?}"),
        }

        let none: Vec<String> = Vec::new();
        let state = compute_dashboard_state(
            &fx.inputs,
            Some(none.as_slice()),
            &mut caches(),
            Instant::now(),
        );
        assert!(matches!(state.view, View::NoSelection));
    }

    #[test]
    fn logs_are_cached_within_ttl() {
        let fx = Fixture::new(&["a"], &[]);
        fx.write_log("a", "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"exit_code\":0}\n");
        let mut caches = caches();
        let t0 = Instant::now();

        let first = compute_dashboard_state(&fx.inputs, None, &mut caches, t0);
        assert!(matches!(first.view, View::Data { .. }));

        fx.write_log("a", "");
        let cached =
            compute_dashboard_state(&fx.inputs, None, &mut caches, t0 + Duration::from_secs(1));
        assert!(matches!(cached.view, View::Data { .. }));

        let refreshed =
            compute_dashboard_state(&fx.inputs, None, &mut caches, t0 + Duration::from_secs(5));
        assert!(matches!(refreshed.view, View::Waiting { .. }));
    }

    #[test]
    fn config_failure_is_cached_within_ttl() {
        let fx = Fixture::new(&["a"], &[]);
        fx.write_log("a", "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"exit_code\":0}\n");
        let good = std::fs::read_to_string(&fx.inputs.config_path).unwrap();
        std::fs::write(&fx.inputs.config_path, "broken = [").unwrap();

        let mut caches = caches();
        let t0 = Instant::now();
        let state = compute_dashboard_state(&fx.inputs, None, &mut caches, t0);
        assert!(matches!(state.view, View::NoLogDirectory));

        std::fs::write(&fx.inputs.config_path, good).unwrap();
        let state =
            compute_dashboard_state(&fx.inputs, None, &mut caches, t0 + Duration::from_secs(29));
        assert!(matches!(state.view, View::NoLogDirectory));

        let state =
            compute_dashboard_state(&fx.inputs, None, &mut caches, t0 + Duration::from_secs(30));
        assert!(matches!(state.view, View::Data { .. }));
        assert!(state.config_error.is_none());
    }

    #[test]
    fn state_serializes_with_view_kind() {
        let fx = Fixture::new(&[], &[]);
        let state = compute_dashboard_state(&fx.inputs, None, &mut caches(), Instant::now());
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["view"]["kind"], state.view.kind());
        assert_eq!(v["view"]["kind"], "no_selection");
        assert_eq!(v["selection"]["source"], "config");
    }
}
