//! Application configuration for autograde.
//!
//! Config is looked up at `./autograde.toml`, then
//! `~/.autograde/autograde.toml`. CLI flags override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutogradeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "autograde.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".autograde";

// ---------------------------------------------------------------------------
// Config structs (matching autograde.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lab project layout.
    #[serde(default)]
    pub lab: LabConfig,

    /// External commands.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Question execution limits.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Report output.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[lab]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    /// Directory holding one build template per lab name.
    #[serde(default = "default_template_root")]
    pub template_root: PathBuf,

    /// Question source directory relative to a project root.
    #[serde(default = "default_package_dir")]
    pub package_dir: PathBuf,

    /// Java package of the `QuestionN` classes.
    #[serde(default = "default_package_name")]
    pub package_name: String,

    /// Directory holding `qN*` fixtures and rubrics.
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,

    /// Java security manager policy file.
    #[serde(default = "default_security_policy")]
    pub security_policy: PathBuf,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            template_root: default_template_root(),
            package_dir: default_package_dir(),
            package_name: default_package_name(),
            fixtures_dir: default_fixtures_dir(),
            security_policy: default_security_policy(),
        }
    }
}

fn default_template_root() -> PathBuf {
    "LabTemplate".into()
}
fn default_package_dir() -> PathBuf {
    "src/edu/carrollcc/cis132".into()
}
fn default_package_name() -> String {
    "edu.carrollcc.cis132".into()
}
fn default_fixtures_dir() -> PathBuf {
    ".".into()
}
fn default_security_policy() -> PathBuf {
    "secpolicy".into()
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_unzip")]
    pub unzip: String,

    #[serde(default = "default_ant")]
    pub ant: String,

    #[serde(default = "default_java")]
    pub java: String,

    /// Editor used by `--open` (e.g. `mate`, `code`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_with: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            unzip: default_unzip(),
            ant: default_ant(),
            java: default_java(),
            open_with: None,
        }
    }
}

fn default_unzip() -> String {
    "unzip".into()
}
fn default_ant() -> String {
    "ant".into()
}
fn default_java() -> String {
    "java".into()
}

/// `[execution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Hard wall-clock limit per question run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause after each stdin line, so programs with several
    /// `Scanner`s on `System.in` each see their own input.
    #[serde(default = "default_input_delay_ms")]
    pub input_delay_ms: u64,

    /// Captured output beyond this many bytes is dropped from the report.
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            input_delay_ms: default_input_delay_ms(),
            output_limit_bytes: default_output_limit_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}
fn default_input_delay_ms() -> u64 {
    200
}
fn default_output_limit_bytes() -> usize {
    5000
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn input_delay(&self) -> Duration {
        Duration::from_millis(self.input_delay_ms)
    }
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    "output".into()
}

impl AppConfig {
    /// Reject values that would make every run fail in confusing ways.
    pub fn validate(&self) -> Result<()> {
        if self.execution.timeout_secs == 0 {
            return Err(AutogradeError::config(
                "execution.timeout_secs must be greater than zero",
            ));
        }
        if self.lab.package_name.trim().is_empty() {
            return Err(AutogradeError::config("lab.package_name must not be empty"));
        }
        for (key, cmd) in [
            ("tools.unzip", &self.tools.unzip),
            ("tools.ant", &self.tools.ant),
            ("tools.java", &self.tools.java),
        ] {
            if cmd.trim().is_empty() {
                return Err(AutogradeError::config(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.autograde/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AutogradeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.autograde/autograde.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config.
///
/// An explicit path must exist. Otherwise `./autograde.toml` wins over the
/// user config file, and defaults are used when neither exists.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return load_config_from(&local);
    }

    match config_file_path() {
        Ok(path) if path.is_file() => load_config_from(&path),
        _ => {
            tracing::debug!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AutogradeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AutogradeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AutogradeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| AutogradeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AutogradeError::io(&path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("template_root"));
        assert!(toml_str.contains("edu.carrollcc.cis132"));
        assert!(!toml_str.contains("open_with"));
    }

    #[test]
    fn defaults_match_grading_conventions() {
        let config = AppConfig::default();
        assert_eq!(config.execution.timeout(), Duration::from_secs(20));
        assert_eq!(config.execution.input_delay(), Duration::from_millis(200));
        assert_eq!(config.execution.output_limit_bytes, 5000);
        assert_eq!(config.report.output_dir, PathBuf::from("output"));
        assert_eq!(config.lab.security_policy, PathBuf::from("secpolicy"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let toml_str = r#"
[execution]
timeout_secs = 5

[tools]
open_with = "mate"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.execution.timeout_secs, 5);
        assert_eq!(config.execution.input_delay_ms, 200);
        assert_eq!(config.tools.open_with.as_deref(), Some("mate"));
        assert_eq!(config.tools.java, "java");
        assert_eq!(config.lab.template_root, PathBuf::from("LabTemplate"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.execution.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autograde.toml");
        std::fs::write(&path, "[report]\noutput_dir = \"reports\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.report.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(AutogradeError::Io { .. })));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[execution\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
