//! # Process Descriptor Store.
//!
//! Loads and validates the configuration document. Validation is per descriptor:
//! one bad entry is reported in [`LoadReport::rejected`] and the rest still load.
//!
//! ```text
//! ConfigSource ──► parse (TOML | JSON) ──► RawDocument
//!                       │ error → ConfigError (fatal)
//!                       ▼
//!          [supervisor] ──► SupervisorConfig
//!          [[apps]]     ──► validate each ──► ProcessDescriptor | ConfigError
//! ```
//!
//! Validation rules:
//! - `name` present and non-empty, not `"all"`, unique (later duplicates are rejected)
//! - `script`/`command` present and non-empty
//! - `1 <= instances <= MAX_INSTANCES` (default 1)
//! - `cron_restart` parses as a five-field expression
//! - durations parse
//!
//! A relative `cwd` resolves against the configuration file's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::SupervisorConfig;
use crate::error::{ConfigError, ControlError};
use crate::schedule::CronExpr;

use super::descriptor::{MAX_INSTANCES, ProcessDescriptor};
use super::raw::{RawApp, RawDocument};

/// Where the configuration document comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A file; `.json` selects JSON, anything else TOML.
    Path(PathBuf),
    /// An in-memory TOML document.
    Toml(String),
    /// An in-memory JSON document.
    Json(String),
}

/// Result of a load: the usable part plus the per-descriptor rejections.
#[derive(Debug)]
pub struct LoadReport {
    /// Runtime settings (defaults overridden by `[supervisor]`).
    pub supervisor: SupervisorConfig,
    /// Valid descriptors, in document order.
    pub descriptors: Vec<ProcessDescriptor>,
    /// One error per rejected descriptor.
    pub rejected: Vec<ConfigError>,
}

impl LoadReport {
    /// Finds a loaded descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ProcessDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Descriptors selected by `target` (a name or `"all"`).
    pub fn select(&self, target: &str) -> Result<Vec<&ProcessDescriptor>, ControlError> {
        if target == "all" {
            return Ok(self.descriptors.iter().collect());
        }
        self.get(target)
            .map(|desc| vec![desc])
            .ok_or_else(|| ControlError::NotFound {
                name: target.to_string(),
            })
    }
}

/// Stateless loader for descriptor documents.
pub struct DescriptorStore;

impl DescriptorStore {
    /// Loads and validates a document.
    ///
    /// Returns `Err` only when the document as a whole is unusable
    /// ([`ConfigError::is_fatal`]).
    ///
    /// # Example
    /// ```
    /// use procvisor::{ConfigSource, DescriptorStore};
    ///
    /// let doc = r#"
    /// [[apps]]
    /// name = "dsp"
    /// script = "./respeaker_core"
    /// cron_restart = "0 * * * *"
    ///
    /// [[apps]]
    /// name = "broken"
    /// instances = 0
    /// script = "true"
    /// "#;
    ///
    /// let report = DescriptorStore::load(ConfigSource::Toml(doc.into())).unwrap();
    /// assert_eq!(report.descriptors.len(), 1);
    /// assert_eq!(report.rejected[0].as_label(), "config_invalid_instances");
    /// ```
    pub fn load(source: ConfigSource) -> Result<LoadReport, ConfigError> {
        let (doc, base) = match source {
            ConfigSource::Path(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let doc = if path.extension().is_some_and(|ext| ext == "json") {
                    parse_json(&text)?
                } else {
                    parse_toml(&text)?
                };
                let base = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf);
                (doc, base)
            }
            ConfigSource::Toml(text) => (parse_toml(&text)?, None),
            ConfigSource::Json(text) => (parse_json(&text)?, None),
        };
        Self::from_document(doc, base.as_deref())
    }

    /// Shorthand for `load(ConfigSource::Path(path))`.
    pub fn load_path(path: impl Into<PathBuf>) -> Result<LoadReport, ConfigError> {
        Self::load(ConfigSource::Path(path.into()))
    }

    fn from_document(doc: RawDocument, base: Option<&Path>) -> Result<LoadReport, ConfigError> {
        let mut supervisor = SupervisorConfig::default();
        if let Some(raw) = doc.supervisor {
            supervisor.apply(raw, base)?;
        }

        let mut descriptors = Vec::with_capacity(doc.apps.len());
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();

        for (index, app) in doc.apps.into_iter().enumerate() {
            match validate(index, app, base) {
                Ok(desc) if !seen.insert(desc.name().to_string()) => {
                    rejected.push(ConfigError::DuplicateName {
                        name: desc.name().to_string(),
                    });
                }
                Ok(desc) => descriptors.push(desc),
                Err(err) => rejected.push(err),
            }
        }

        for err in &rejected {
            tracing::warn!(label = err.as_label(), error = %err, "descriptor rejected");
        }
        Ok(LoadReport {
            supervisor,
            descriptors,
            rejected,
        })
    }
}

fn parse_toml(text: &str) -> Result<RawDocument, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

fn parse_json(text: &str) -> Result<RawDocument, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

fn validate(index: usize, app: RawApp, base: Option<&Path>) -> Result<ProcessDescriptor, ConfigError> {
    let name = match app.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(ConfigError::MissingName { index }),
    };
    if name == "all" {
        return Err(ConfigError::ReservedName { name });
    }

    let command = match app.command.as_deref().map(str::trim) {
        Some(cmd) if !cmd.is_empty() => cmd.to_string(),
        _ => return Err(ConfigError::MissingCommand { name }),
    };

    let instances = match app.instances {
        None => 1,
        Some(n) if (1..=i64::from(MAX_INSTANCES)).contains(&n) => n as u32,
        Some(n) => {
            return Err(ConfigError::InvalidInstances { name, instances: n });
        }
    };

    let mut desc = ProcessDescriptor::new(name.as_str(), command)
        .with_instances(instances)
        .with_args(app.args.into_vec())
        .with_merge_logs(app.merge_logs);

    for (key, value) in app.env {
        desc = desc.with_env(key, value.into_string());
    }

    if let Some(cwd) = app.cwd {
        let cwd = match base {
            Some(base) if cwd.is_relative() => base.join(cwd),
            _ => cwd,
        };
        desc = desc.with_cwd(cwd);
    }

    if let Some(expr) = app.cron_restart {
        let cron = CronExpr::parse(&expr).map_err(|e| ConfigError::InvalidSchedule {
            name: name.clone(),
            expr: expr.clone(),
            reason: e.to_string(),
        })?;
        desc = desc.with_cron(cron);
    }

    if let Some(path) = app.out_file {
        desc = desc.with_out_file(path);
    }
    if let Some(path) = app.error_file {
        desc = desc.with_error_file(path);
    }
    if let Some(d) = app.kill_timeout {
        desc = desc.with_kill_timeout(d.resolve(&format!("{name}.kill_timeout"))?);
    }
    if let Some(d) = app.min_uptime {
        desc = desc.with_min_uptime(d.resolve(&format!("{name}.min_uptime"))?);
    }
    if let Some(n) = app.max_restarts {
        desc = desc.with_max_restarts(n);
    }
    Ok(desc)
}
