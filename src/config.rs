use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME: &str = "sesslint.toml";

/// User-facing preferences stored in `~/.sesslint/sesslint.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model passed to the external CLI.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name (or path) of the external CLI binary.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Upper bound on one analysis call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap on messages read from one session transcript.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// How many recent sessions `report` checks by default.
    #[serde(default = "default_report_count")]
    pub report_count: usize,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}

fn default_binary() -> String {
    "claude".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_messages() -> usize {
    200
}

fn default_report_count() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            binary: default_binary(),
            timeout_secs: default_timeout_secs(),
            max_messages: default_max_messages(),
            report_count: default_report_count(),
        }
    }
}

impl Config {
    /// Load preferences from `<dir>/sesslint.toml`.
    ///
    /// If the file doesn't exist it is created with defaults. Missing keys
    /// in an existing file are filled in with defaults via serde.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(FILENAME);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Config::default();
                let toml_str =
                    toml::to_string_pretty(&config).context("serializing default config")?;
                fs::write(&path, &toml_str)
                    .with_context(|| format!("writing default {}", path.display()))?;
                Ok(config)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

/// Filesystem roots, resolved once and threaded through explicitly so every
/// component stays testable under an arbitrary home directory.
#[derive(Debug, Clone)]
pub struct Dirs {
    home: PathBuf,
}

impl Dirs {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve from `$HOME`.
    pub fn from_env() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("HOME is not set")?;
        Ok(Self { home })
    }

    /// `~/.sesslint/`
    pub fn config_dir(&self) -> PathBuf {
        self.home.join(".sesslint")
    }

    /// `~/.sesslint/policy.md`
    pub fn policy_path(&self) -> PathBuf {
        self.config_dir().join("policy.md")
    }

    /// Where Claude Code keeps per-project session logs.
    pub fn projects_dir(&self) -> PathBuf {
        self.home.join(".claude").join("projects")
    }

    /// The Claude Code settings file edited by hook install/uninstall.
    pub fn claude_settings_path(&self) -> PathBuf {
        self.home.join(".claude").join("settings.json")
    }

    /// Create `~/.sesslint/` if missing and return it.
    pub fn ensure_config_dir(&self) -> Result<PathBuf> {
        let dir = self.config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(dir)
    }
}
