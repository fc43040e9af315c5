use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "PROCESS_DASHBOARD_CONFIG";

/// Top-level shape of the shared settings file.
///
/// The file is owned by the process supervisor; only the keys below are
/// read and everything else is ignored.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SettingsFile {
    pub output_path: OutputPathSection,
    pub process_dashboard: DashboardSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct OutputPathSection {
    pub logs: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DashboardSection {
    pub names: Vec<String>,
    #[serde(flatten)]
    pub settings: DashboardSettings,
}

/// Server and refresh settings, all optional in `[process_dashboard]`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardSettings {
    pub bind: String,
    pub port: u16,
    pub refresh_secs: u64,
    pub config_ttl_secs: u64,
    pub log_ttl_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8501,
            refresh_secs: 5,
            config_ttl_secs: 30,
            log_ttl_secs: 5,
        }
    }
}

/// What the dashboard needs from the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    pub log_directory: Option<PathBuf>,
    pub default_process_names: Vec<String>,
}

/// Resolve the settings file location: `$PROCESS_DASHBOARD_CONFIG`, else
/// `config.toml` in the working directory.
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => std::env::current_dir()
            .unwrap_or_default()
            .join("config.toml"),
    }
}

/// Load the log directory and default process names.
///
/// A missing `output_path.logs` is an error: the dashboard has nothing to
/// read without it.
pub fn load_config(path: &Path) -> Result<ProcessConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: SettingsFile = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let log_directory = file
        .output_path
        .logs
        .ok_or_else(|| ConfigError::MissingLogDirectory {
            path: path.to_path_buf(),
        })?;

    Ok(ProcessConfig {
        log_directory: Some(log_directory),
        default_process_names: file.process_dashboard.names,
    })
}

/// Dashboard settings for startup, or defaults if the file is unusable.
pub fn load_settings(path: &Path) -> DashboardSettings {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("failed to read {}: {e}; using default settings", path.display());
            return DashboardSettings::default();
        }
    };
    match toml::from_str::<SettingsFile>(&contents) {
        Ok(file) => file.process_dashboard.settings,
        Err(e) => {
            tracing::warn!("failed to parse {}: {e}; using default settings", path.display());
            DashboardSettings::default()
        }
    }
}

/// Errors from loading the settings file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    MissingLogDirectory {
        path: PathBuf,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "error loading config file '{}': {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "error parsing config file '{}': {source}", path.display())
            }
            ConfigError::MissingLogDirectory { path } => {
                write!(
                    f,
                    "config file '{}' has no [output_path] logs entry",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingLogDirectory { .. } => None,
        }
    }
}
