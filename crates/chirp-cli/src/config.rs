//! Compiler settings – reads/writes `~/.chirp/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when a sequence references a file that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Ask on the terminal each time.
    #[default]
    Prompt,
    /// Leave the element out and keep compiling.
    Skip,
    /// Cancel the whole compilation.
    Abort,
}

impl std::fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPolicy::Prompt => write!(f, "prompt"),
            MissingPolicy::Skip => write!(f, "skip"),
            MissingPolicy::Abort => write!(f, "abort"),
        }
    }
}

impl std::str::FromStr for MissingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(MissingPolicy::Prompt),
            "skip" => Ok(MissingPolicy::Skip),
            "abort" => Ok(MissingPolicy::Abort),
            other => Err(format!("unknown missing-reference policy '{other}'")),
        }
    }
}

/// Persisted user configuration stored in `~/.chirp/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory generated sketches are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where expression files live.  Relative paths are tried against the
    /// sequence's directory and then its parent.
    #[serde(default = "default_expressions_dir")]
    pub expressions_dir: PathBuf,

    #[serde(default)]
    pub on_missing: MissingPolicy,

    /// Give each sketch a folder of its own, as the Arduino IDE expects.
    #[serde(default = "default_sketch_folders")]
    pub sketch_folders: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_expressions_dir() -> PathBuf {
    PathBuf::from("expressions")
}
fn default_sketch_folders() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            expressions_dir: default_expressions_dir(),
            on_missing: MissingPolicy::default(),
            sketch_folders: default_sketch_folders(),
        }
    }
}

/// Return the path to `~/.chirp/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".chirp").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg = parse(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Parse config text without consulting the environment.
pub(crate) fn parse(raw: &str) -> Result<Config, String> {
    toml::from_str(raw).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Load the config, falling back to defaults (with environment overrides)
/// when no file exists.
pub fn load_or_default() -> Result<Config, String> {
    match load()? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `CHIRP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CHIRP_OUTPUT_DIR` | `output_dir` |
/// | `CHIRP_EXPRESSIONS_DIR` | `expressions_dir` |
/// | `CHIRP_ON_MISSING` | `on_missing` |
/// | `CHIRP_SKETCH_FOLDERS` | `sketch_folders` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CHIRP_OUTPUT_DIR") {
        cfg.output_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("CHIRP_EXPRESSIONS_DIR") {
        cfg.expressions_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("CHIRP_ON_MISSING")
        && let Ok(policy) = v.parse::<MissingPolicy>()
    {
        cfg.on_missing = policy;
    }
    if let Ok(v) = std::env::var("CHIRP_SKETCH_FOLDERS")
        && let Ok(flag) = v.trim().parse::<bool>()
    {
        cfg.sketch_folders = flag;
    }
}

/// Save the config to disk, creating `~/.chirp/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
