//! TOML Configuration File Support
//!
//! Configuration is loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the binary through [`DeskConfig::set_cli`])
//! 2. Environment variables (`DESKAPP_FPS`, `DESKAPP_TITLE`, `DESKAPP_LOG_FILE`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! The default file location follows XDG: `$XDG_CONFIG_HOME/deskapp/deskapp.toml`.
//!
//! # Example Configuration
//!
//! ```toml
//! [app]
//! title = "my desk"
//! fps = 30
//! splash = true
//! mouse = true
//! message_log_capacity = 300
//!
//! [layout]
//! h_split = 0.2
//! v_split = 0.16
//! r_split = 0.25
//!
//! [layout.visible]
//! right = true
//!
//! [bus]
//! capacity = 1000
//! max_events_per_frame = 100
//! max_time_ms_per_frame = 5
//!
//! [log]
//! file = "/tmp/deskapp.log"
//! filter = "deskapp=debug"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::{DEFAULT_CAPACITY, DEFAULT_MAX_EVENTS_PER_FRAME, DEFAULT_MAX_TIME_PER_FRAME};
use crate::frame::MAX_FPS;
use crate::layout::{PanelVisibility, SplitRatios};
use crate::state::DEFAULT_MESSAGE_CAPACITY;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[app]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppToml {
    /// Header title
    pub title: Option<String>,
    /// Frame rate cap
    pub fps: Option<u32>,
    /// Show the splash animation
    pub splash: Option<bool>,
    /// Capture mouse clicks
    pub mouse: Option<bool>,
    /// Message log entries kept
    pub message_log_capacity: Option<usize>,
}

/// `[layout.visible]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityToml {
    /// Header
    pub header: Option<bool>,
    /// Footer
    pub footer: Option<bool>,
    /// Menu
    pub menu: Option<bool>,
    /// Messages
    pub messages: Option<bool>,
    /// Right sidebar
    pub right: Option<bool>,
    /// Info strip
    pub info: Option<bool>,
    /// Floating overlay
    pub floating: Option<bool>,
}

/// `[layout]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutToml {
    /// Menu width fraction
    pub h_split: Option<f64>,
    /// Messages height fraction
    pub v_split: Option<f64>,
    /// Right sidebar width fraction
    pub r_split: Option<f64>,
    /// Visibility toggles
    pub visible: VisibilityToml,
}

/// `[bus]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusToml {
    /// Queue capacity
    pub capacity: Option<usize>,
    /// Events drained per frame
    pub max_events_per_frame: Option<usize>,
    /// Milliseconds spent draining per frame
    pub max_time_ms_per_frame: Option<u64>,
}

/// `[log]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogToml {
    /// Log file path
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive
    pub filter: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskToml {
    /// `[app]`
    pub app: AppToml,
    /// `[layout]`
    pub layout: LayoutToml,
    /// `[bus]`
    pub bus: BusToml,
    /// `[log]`
    pub log: LogToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration of an application
#[derive(Clone, Debug)]
pub struct DeskConfig {
    /// Header title
    pub title: String,
    /// Frame rate cap
    pub fps: u32,
    /// Show the splash animation before the loop
    pub splash: bool,
    /// Capture mouse clicks
    pub mouse: bool,
    /// Message log capacity
    pub message_log_capacity: usize,
    /// Initial split ratios
    pub splits: SplitRatios,
    /// Initial panel toggles
    pub visibility: PanelVisibility,
    /// Event queue capacity
    pub bus_capacity: usize,
    /// Events drained per frame
    pub max_events_per_frame: usize,
    /// Time spent draining per frame
    pub max_time_per_frame: Duration,
    /// Where logs go; `None` disables the file logger
    pub log_file: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    sources: BTreeMap<&'static str, ConfigSource>,
    ignored: Vec<String>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            title: "deskapp".to_string(),
            fps: 30,
            splash: true,
            mouse: true,
            message_log_capacity: DEFAULT_MESSAGE_CAPACITY,
            splits: SplitRatios::default(),
            visibility: PanelVisibility::classic(),
            bus_capacity: DEFAULT_CAPACITY,
            max_events_per_frame: DEFAULT_MAX_EVENTS_PER_FRAME,
            max_time_per_frame: DEFAULT_MAX_TIME_PER_FRAME,
            log_file: None,
            log_filter: "deskapp=info".to_string(),
            sources: BTreeMap::new(),
            ignored: Vec::new(),
        }
    }
}

impl DeskConfig {
    /// Where a value came from; anything never overridden is `Default`
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources.get(key).copied().unwrap_or(ConfigSource::Default)
    }

    fn mark(&mut self, key: &'static str, source: ConfigSource) {
        self.sources.insert(key, source);
    }

    /// Environment values that could not be parsed and were skipped
    ///
    /// Kept so the binary can report them once logging is set up.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Apply a parsed TOML file on top of the current values
    pub fn apply_toml(&mut self, toml: &DeskToml) {
        let src = ConfigSource::File;

        if let Some(title) = &toml.app.title {
            self.title = title.clone();
            self.mark("title", src);
        }
        if let Some(fps) = toml.app.fps {
            self.fps = fps;
            self.mark("fps", src);
        }
        if let Some(splash) = toml.app.splash {
            self.splash = splash;
            self.mark("splash", src);
        }
        if let Some(mouse) = toml.app.mouse {
            self.mouse = mouse;
            self.mark("mouse", src);
        }
        if let Some(cap) = toml.app.message_log_capacity {
            self.message_log_capacity = cap;
            self.mark("message_log_capacity", src);
        }

        if let Some(h) = toml.layout.h_split {
            self.splits.h_split = h;
            self.mark("h_split", src);
        }
        if let Some(v) = toml.layout.v_split {
            self.splits.v_split = v;
            self.mark("v_split", src);
        }
        if let Some(r) = toml.layout.r_split {
            self.splits.r_split = r;
            self.mark("r_split", src);
        }

        let vis = &toml.layout.visible;
        let mut toggled = Vec::new();
        for (key, flag, slot) in [
            ("header", vis.header, &mut self.visibility.header),
            ("footer", vis.footer, &mut self.visibility.footer),
            ("menu", vis.menu, &mut self.visibility.menu),
            ("messages", vis.messages, &mut self.visibility.messages),
            ("right", vis.right, &mut self.visibility.right),
            ("info", vis.info, &mut self.visibility.info),
            ("floating", vis.floating, &mut self.visibility.floating),
        ] {
            if let Some(flag) = flag {
                *slot = flag;
                toggled.push(key);
            }
        }
        for key in toggled {
            self.mark(key, src);
        }

        if let Some(cap) = toml.bus.capacity {
            self.bus_capacity = cap;
            self.mark("bus_capacity", src);
        }
        if let Some(n) = toml.bus.max_events_per_frame {
            self.max_events_per_frame = n;
            self.mark("max_events_per_frame", src);
        }
        if let Some(ms) = toml.bus.max_time_ms_per_frame {
            self.max_time_per_frame = Duration::from_millis(ms);
            self.mark("max_time_per_frame", src);
        }

        if let Some(file) = &toml.log.file {
            self.log_file = Some(file.clone());
            self.mark("log_file", src);
        }
        if let Some(filter) = &toml.log.filter {
            self.log_filter = filter.clone();
            self.mark("log_filter", src);
        }
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Unparseable values are skipped and listed in [`DeskConfig::ignored`].
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(fps) = lookup("DESKAPP_FPS") {
            match fps.trim().parse() {
                Ok(fps) => {
                    self.fps = fps;
                    self.mark("fps", ConfigSource::Env);
                }
                Err(_) => {
                    tracing::debug!(value = %fps, "ignoring invalid DESKAPP_FPS");
                    self.ignored.push(format!("DESKAPP_FPS={fps}"));
                }
            }
        }
        if let Some(title) = lookup("DESKAPP_TITLE") {
            self.title = title;
            self.mark("title", ConfigSource::Env);
        }
        if let Some(file) = lookup("DESKAPP_LOG_FILE") {
            self.log_file = Some(PathBuf::from(file));
            self.mark("log_file", ConfigSource::Env);
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Record that the binary set a value from its command line
    pub fn set_cli(&mut self, key: &'static str) {
        self.mark(key, ConfigSource::Cli);
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(ConfigError::ValidationError(format!(
                "fps must be in 1..={MAX_FPS}, got {}",
                self.fps
            )));
        }
        self.splits
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if self.bus_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "bus capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_events_per_frame == 0 {
            return Err(ConfigError::ValidationError(
                "max_events_per_frame must be greater than zero".to_string(),
            ));
        }
        if self.message_log_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "message_log_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file path (`$XDG_CONFIG_HOME/deskapp/deskapp.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deskapp").join("deskapp.toml"))
}

/// Parse a TOML file
pub fn read_toml(path: &Path) -> Result<DeskToml, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Load configuration from defaults, a TOML file and the environment
///
/// With an explicit `path` the file must exist. Without one, the XDG default
/// is used if present and silently skipped otherwise.
///
/// The result is not validated: command line overrides still have to be
/// applied, so callers run [`DeskConfig::validate`] once they are done.
pub fn load_config(path: Option<&Path>) -> Result<DeskConfig, ConfigError> {
    let mut config = DeskConfig::default();

    match path {
        Some(path) => config.apply_toml(&read_toml(path)?),
        None => {
            if let Some(default) = default_config_path().filter(|p| p.exists()) {
                tracing::debug!(path = %default.display(), "loading config file");
                config.apply_toml(&read_toml(&default)?);
            }
        }
    }

    config.apply_env();
    Ok(config)
}
