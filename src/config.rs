//! Launch configuration: built-in defaults, user overrides, and the merge
//! rule that combines them.
//!
//! The merge is shallow with one special case: the `args` list is
//! concatenated (defaults first, then override) rather than replaced. Every
//! other field overrides when present. The merged result is then turned into
//! a per-call [`LaunchPlan`], so repeated opens never see state left over
//! from a previous call.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(test)]
mod proptests;

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 30_000;

/// Launch args applied to every session unless overridden away.
fn default_args() -> Vec<String> {
    vec![
        "--disable-gpu".to_string(),
        "--disable-software-rasterizer".to_string(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Partially-specified launch options from a user config file. Absent fields
/// fall back to the built-in defaults at merge time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOverrides {
    pub args: Option<Vec<String>>,
    pub viewport: Option<ViewportSize>,
    pub headless: Option<bool>,
    pub ignore_default_args: Option<Vec<String>>,
    /// Launch timeout in milliseconds, also applied to the initial navigation.
    #[serde(rename = "timeout")]
    pub launch_timeout_ms: Option<u64>,
}

/// Where to write captured network activity when the session closes.
/// Both outputs may be set at once; each produces exactly one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarOutputConfig {
    /// Raw HAR JSON destination.
    pub file: Option<PathBuf>,
    /// Self-contained HTML report destination.
    pub html: Option<PathBuf>,
}

impl HarOutputConfig {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.html.is_none()
    }
}

/// Per-open configuration supplied by the host, either as a typed value or
/// loaded from a JSON file via [`ProviderConfig::from_file`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub chromium: LaunchOverrides,
    /// Launch the URL as a standalone application window. The browser loads
    /// the page itself, so no separate navigation call is issued.
    #[serde(default)]
    pub app_mode: bool,
    #[serde(default)]
    pub disable_info_bars: bool,
    /// `false` (or absent) disables capture entirely.
    #[serde(default, deserialize_with = "de_har")]
    pub har: Option<HarOutputConfig>,
}

/// Accepts `false` as "no capture" in addition to the object form, matching
/// the config file contract (`har: false | {file?, html?}`).
fn de_har<'de, D>(deserializer: D) -> Result<Option<HarOutputConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(None),
        serde_json::Value::Bool(true) => Ok(Some(HarOutputConfig::default())),
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(D::Error::custom),
    }
}

impl ProviderConfig {
    /// Load a config file (JSON). Missing, unreadable, or malformed files are
    /// fatal: the open call they belong to must not proceed on guessed
    /// defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::config(path, e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ProviderError::config(path, e.to_string()))
    }
}

/// Fully-resolved launch options after merging defaults with an override.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLaunch {
    pub args: Vec<String>,
    pub viewport: ViewportSize,
    pub headless: bool,
    pub ignore_default_args: Vec<String>,
    pub launch_timeout: Duration,
}

impl Default for ResolvedLaunch {
    fn default() -> Self {
        Self {
            args: default_args(),
            viewport: ViewportSize {
                width: DEFAULT_VIEWPORT_WIDTH,
                height: DEFAULT_VIEWPORT_HEIGHT,
            },
            headless: true,
            ignore_default_args: Vec::new(),
            launch_timeout: Duration::from_millis(DEFAULT_LAUNCH_TIMEOUT_MS),
        }
    }
}

impl ResolvedLaunch {
    /// Shallow-merge an override into these options. `args` is the one
    /// array-concatenated field: the override list extends the existing one,
    /// it never replaces it.
    pub fn merged_with(mut self, overrides: &LaunchOverrides) -> Self {
        if let Some(extra) = &overrides.args {
            self.args.extend(extra.iter().cloned());
        }
        if let Some(viewport) = overrides.viewport {
            self.viewport = viewport;
        }
        if let Some(headless) = overrides.headless {
            self.headless = headless;
        }
        if let Some(ignored) = &overrides.ignore_default_args {
            self.ignore_default_args = ignored.clone();
        }
        if let Some(ms) = overrides.launch_timeout_ms {
            self.launch_timeout = Duration::from_millis(ms);
        }
        self
    }
}

/// Everything `open_browser` needs to know, computed up front from the URL
/// and config. Building the plan has no side effects, so the
/// option-assembly rules stay unit-testable without a browser.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    /// Final command-line args, with ignored entries filtered out.
    pub args: Vec<String>,
    pub viewport: ViewportSize,
    pub headless: bool,
    /// Default args suppressed for this launch. chromiumoxide has no per-arg
    /// suppression hook, so entries here are also stripped from `args`.
    pub ignored_default_args: Vec<String>,
    pub launch_timeout: Duration,
    /// `None` in app mode: the browser loads the URL itself via `--app=`.
    pub navigation_url: Option<String>,
    pub app_mode: bool,
}

impl LaunchPlan {
    pub fn build(url: &str, config: &ProviderConfig) -> Self {
        let mut launch = ResolvedLaunch::default().merged_with(&config.chromium);

        if config.disable_info_bars {
            launch.args.push("--no-default-browser-check".to_string());
            launch
                .ignore_default_args
                .push("--enable-automation".to_string());
        }

        let (navigation_url, app_mode) = if config.app_mode {
            launch.args.push(format!("--app={url}"));
            (None, true)
        } else {
            (Some(url.to_string()), false)
        };

        let ignored = launch.ignore_default_args;
        let mut args = launch.args;
        args.retain(|arg| !is_ignored(arg, &ignored));

        Self {
            args,
            viewport: launch.viewport,
            headless: launch.headless,
            ignored_default_args: ignored,
            launch_timeout: launch.launch_timeout,
            navigation_url,
            app_mode,
        }
    }
}

/// An arg is ignored on an exact match or a `--flag=value` match against a
/// bare `--flag` entry.
fn is_ignored(arg: &str, ignored: &[String]) -> bool {
    ignored.iter().any(|ig| {
        arg == ig
            || arg
                .strip_prefix(ig.as_str())
                .is_some_and(|rest| rest.starts_with('='))
    })
}
