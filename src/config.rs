//! TOML configuration.
//!
//! One file describes the state database, the DiMe sink, pipeline-wide
//! settings and one `[loggers.<name>]` table per logger identity (usually a
//! browser profile). The parsed [`Config`] is passed explicitly into every
//! command; nothing is read from process-wide state after loading.
//!
//! ```toml
//! [state]
//! path = "./data/hsync.sqlite"
//!
//! [sink]
//! url = "http://localhost:8080/api"
//! username = "testuser"
//! password_env = "DIME_PASSWORD"
//!
//! [sync]
//! fulltext = true
//!
//! [loggers.firefox]
//! history_file = "/home/me/.mozilla/firefox/abcd.default/places.sqlite"
//! max_events = 500
//! denylist = ["*://localhost*", "*mail.google.com*"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::filter::Denylist;

pub const NFO: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#";
pub const NUAO: &str = "http://www.semanticdesktop.org/ontologies/2010/01/25/nuao#";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub state: StateConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub loggers: BTreeMap<String, LoggerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    pub path: PathBuf,
    /// Keep at most this many identities per table when pruning.
    #[serde(default)]
    pub max_known_events: Option<usize>,
    /// Forget identities first seen more than this many days ago when pruning.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Name of an environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_event_path")]
    pub event_path: String,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_event_path() -> String {
    "data/event".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default)]
    pub fulltext: bool,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            fulltext: false,
            event_type: default_event_type(),
            document_type: default_document_type(),
            max_text_bytes: default_max_text_bytes(),
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
fn default_event_type() -> String {
    format!("{}UsageEvent", NUAO)
}
fn default_document_type() -> String {
    format!("{}Website", NFO)
}
fn default_max_text_bytes() -> usize {
    1024 * 1024
}

/// History schema flavour of a logger's source database.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chrome,
    Chromium,
}

impl Browser {
    fn infer(logger: &str) -> Self {
        match logger.to_ascii_lowercase() {
            n if n.contains("firefox") => Browser::Firefox,
            n if n.contains("chromium") => Browser::Chromium,
            _ => Browser::Chrome,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    pub history_file: PathBuf,
    #[serde(default)]
    pub browser: Option<Browser>,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
}

fn default_max_events() -> usize {
    500
}

/// A logger table resolved against its name: every optional field filled in.
#[derive(Debug, Clone)]
pub struct LoggerSettings {
    pub name: String,
    pub history_file: PathBuf,
    pub browser: Browser,
    pub max_events: usize,
    pub actor: String,
    pub denylist: Vec<String>,
}

impl Config {
    /// Resolve a logger identity to its effective settings.
    pub fn logger(&self, name: &str) -> Result<LoggerSettings> {
        let Some(lc) = self.loggers.get(name) else {
            let known: Vec<&str> = self.loggers.keys().map(String::as_str).collect();
            bail!(
                "Unknown logger: '{}'. Configured: {}",
                name,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            );
        };

        Ok(LoggerSettings {
            name: name.to_string(),
            history_file: lc.history_file.clone(),
            browser: lc.browser.unwrap_or_else(|| Browser::infer(name)),
            max_events: lc.max_events,
            actor: lc.actor.clone().unwrap_or_else(|| name.to_string()),
            denylist: lc.denylist.clone(),
        })
    }
}

impl SinkConfig {
    /// Password from `password`, or from the variable named by `password_env`.
    pub fn resolve_password(&self) -> Result<Option<String>> {
        if let Some(pw) = &self.password {
            return Ok(Some(pw.clone()));
        }
        match &self.password_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("sink.password_env: {} is not set", var)),
            None => Ok(None),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate sink
    let url = url::Url::parse(&config.sink.url)
        .with_context(|| format!("sink.url is not a valid URL: '{}'", config.sink.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("sink.url must be http or https, got '{}'", url.scheme());
    }
    if config.sink.timeout_secs == 0 {
        bail!("sink.timeout_secs must be > 0");
    }

    // Validate loggers
    for (name, lc) in &config.loggers {
        if lc.max_events == 0 {
            bail!("loggers.{}.max_events must be > 0", name);
        }
        Denylist::new(&lc.denylist)
            .with_context(|| format!("loggers.{}.denylist contains an invalid pattern", name))?;
    }

    if config.state.max_known_events == Some(0) {
        bail!("state.max_known_events must be > 0 when set");
    }

    Ok(())
}
