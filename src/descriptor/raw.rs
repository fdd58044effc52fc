//! Serde shapes of the configuration document.
//!
//! Field names follow pm2's `ecosystem.config.js` (`script`, `out_file`,
//! `error_file`, `merge_logs`, `cron_restart`) with a few aliases. Unknown fields
//! are ignored so existing ecosystem files load unchanged.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(default)]
    pub supervisor: Option<RawSupervisor>,
    #[serde(default, alias = "processes")]
    pub apps: Vec<RawApp>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSupervisor {
    pub grace: Option<RawDuration>,
    pub kill_timeout: Option<RawDuration>,
    pub backoff: Option<RawBackoff>,
    pub max_restarts: Option<u32>,
    pub restart_window: Option<RawDuration>,
    pub min_uptime: Option<RawDuration>,
    pub bus_capacity: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub drain_timeout: Option<RawDuration>,
    pub tick: Option<RawDuration>,
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBackoff {
    pub first: Option<RawDuration>,
    pub max: Option<RawDuration>,
    pub factor: Option<f64>,
    pub jitter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawApp {
    pub name: Option<String>,
    #[serde(alias = "script")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: RawArgs,
    #[serde(default)]
    pub env: BTreeMap<String, RawScalar>,
    pub cwd: Option<PathBuf>,
    pub instances: Option<i64>,
    #[serde(alias = "out", alias = "output")]
    pub out_file: Option<PathBuf>,
    #[serde(alias = "error", alias = "err_file")]
    pub error_file: Option<PathBuf>,
    #[serde(default)]
    pub merge_logs: bool,
    #[serde(alias = "cron")]
    pub cron_restart: Option<String>,
    pub kill_timeout: Option<RawDuration>,
    pub max_restarts: Option<u32>,
    pub min_uptime: Option<RawDuration>,
}

/// `args` may be one shell-like string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawArgs {
    Line(String),
    List(Vec<String>),
}

impl Default for RawArgs {
    fn default() -> Self {
        RawArgs::List(Vec::new())
    }
}

impl RawArgs {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            RawArgs::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            RawArgs::List(list) => list,
        }
    }
}

/// Environment values; numbers and booleans are stringified.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawScalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawScalar {
    pub fn into_string(self) -> String {
        match self {
            RawScalar::Text(s) => s,
            RawScalar::Int(n) => n.to_string(),
            RawScalar::Float(f) => f.to_string(),
            RawScalar::Bool(b) => b.to_string(),
        }
    }
}

/// Integer milliseconds (pm2 style) or a string such as `"10s"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawDuration {
    Millis(u64),
    Text(String),
}

impl RawDuration {
    pub fn resolve(&self, field: &str) -> Result<Duration, ConfigError> {
        match self {
            RawDuration::Millis(ms) => Ok(Duration::from_millis(*ms)),
            RawDuration::Text(text) => {
                parse_duration(text).ok_or_else(|| ConfigError::InvalidDuration {
                    field: field.to_string(),
                    value: text.clone(),
                })
            }
        }
    }
}

/// Parses `"500ms"`, `"10s"`, `"1m30s"`, `"2h"`, `"1.5s"`; a bare number is milliseconds.
pub(crate) fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ms) = text.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return None;
        }
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = rest[num_end..].trim_start();

        let unit_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let secs = match &rest[..unit_end] {
            "ms" => 0.001,
            "s" | "sec" | "secs" => 1.0,
            "m" | "min" | "mins" => 60.0,
            "h" | "hr" | "hrs" => 3600.0,
            _ => return None,
        };
        rest = rest[unit_end..].trim_start();
        total += Duration::try_from_secs_f64(value * secs).ok()?;
    }
    Some(total)
}
