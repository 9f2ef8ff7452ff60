/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed log, viewer, and source configuration
[POS]:    Configuration layer - read-only settings consumed by the log pipeline
[UPDATE]: When adding new configuration options
*/

use std::collections::HashSet;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tailpane_runtime::{CommandSpec, LogOptions, RestartPolicy};

use crate::surface::ViewOptions;

/// Top-level configuration for tailpane
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub gui: GuiConfig,
    /// Local commands exposed as log sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// What to request from the runtime when attaching
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogsConfig {
    #[serde(default)]
    pub timestamps: bool,
    /// RFC 3339 timestamp or relative window (e.g. "60m")
    #[serde(default)]
    pub since: Option<String>,
    /// "all" or a line count
    #[serde(default)]
    pub tail: Option<String>,
    /// Retention cap per session; unbounded when absent
    #[serde(default)]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Pre-highlight matches before writing to the surface
    #[default]
    Highlight,
    /// Let the surface focus the needle itself
    Surface,
}

/// Viewer behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuiConfig {
    #[serde(default = "default_true")]
    pub wrap_main_panel: bool,
    #[serde(default = "default_true")]
    pub autoscroll: bool,
    /// Skip the "press enter" prompt after a stdout dump
    #[serde(default)]
    pub return_immediately: bool,
    #[serde(default = "default_scroll_height")]
    pub scroll_height: usize,
    #[serde(default = "default_true")]
    pub scroll_past_bottom: bool,
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default)]
    pub search_mode: SearchMode,
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            wrap_main_panel: true,
            autoscroll: true,
            return_immediately: false,
            scroll_height: default_scroll_height(),
            scroll_past_bottom: true,
            line_numbers: false,
            search_mode: SearchMode::default(),
            render_interval_ms: default_render_interval_ms(),
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

/// A local command registered as a log source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Stream raw bytes instead of multiplexed stdout/stderr frames
    #[serde(default)]
    pub tty: bool,
    /// Respawn this long after exit; never restarted when absent
    #[serde(default)]
    pub restart_delay_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_scroll_height() -> usize {
    2
}

fn default_render_interval_ms() -> u64 {
    200
}

fn default_liveness_interval_ms() -> u64 {
    100
}

impl AppConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Attach options: both channels, following
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            show_stdout: true,
            show_stderr: true,
            timestamps: self.logs.timestamps,
            since: self.logs.since.clone(),
            tail: self.logs.tail.clone(),
            follow: true,
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            wrap: self.gui.wrap_main_panel,
            autoscroll: self.gui.autoscroll,
            scroll_height: self.gui.scroll_height.max(1),
            scroll_past_bottom: self.gui.scroll_past_bottom,
        }
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.gui.render_interval_ms.max(1))
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.gui.liveness_interval_ms.max(1))
    }

    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.id == id)
    }

    /// Reject option values the runtime would refuse and ambiguous sources.
    pub fn validate(&self) -> anyhow::Result<()> {
        let options = self.log_options();
        options.since_cutoff(Utc::now())?;
        options.tail_limit()?;

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                bail!("source id must not be empty");
            }
            if source.command.trim().is_empty() {
                bail!("source {} has an empty command", source.id);
            }
            if !seen.insert(source.id.as_str()) {
                bail!("duplicate source id: {}", source.id);
            }
        }
        Ok(())
    }
}

impl SourceConfig {
    pub fn command_spec(&self) -> CommandSpec {
        let restart = match self.restart_delay_ms {
            Some(ms) => RestartPolicy::After(Duration::from_millis(ms)),
            None => RestartPolicy::Never,
        };
        CommandSpec::new(self.command.clone(), self.args.clone())
            .with_tty(self.tty)
            .with_restart(restart)
    }
}
