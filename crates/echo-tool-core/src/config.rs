// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-tool options and where hosts keep them.
//!
//! Options live under `tools/<namespace>` in an [`OptionsStore`]; the
//! [`ToolConfig`] repository resolves a namespace to validated
//! [`ToolOptions`], falling back to defaults for tools never configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::throttle::DEFAULT_WINDOW;

/// Blob storage for tool options, keyed by `tools/<namespace>`.
pub trait OptionsStore {
    /// Stored bytes for `key`, `None` when nothing was ever written.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError>;
    /// Replace the bytes stored for `key`.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failures reading, writing or validating tool options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored options were not valid JSON for [`ToolOptions`].
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// `localeDir` was present but not a string path.
    #[error("{namespace}: localeDir must be a string path, found {found}")]
    InvalidLocaleDir {
        /// Tool namespace.
        namespace: String,
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// The platform has no per-user config directory.
    #[error("no config directory available for tool options")]
    NoConfigDir,
}

fn default_throttle_ms() -> u64 {
    u64::try_from(DEFAULT_WINDOW.as_millis()).unwrap_or(u64::MAX)
}

/// Options a host supplies when connecting a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOptions {
    /// Tool namespace; also becomes the tool's name.
    pub namespace: String,
    /// Directory holding the tool's locale files; `None` disables localization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_dir: Option<PathBuf>,
    /// Window of the throttled state channel, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl ToolOptions {
    /// Options for `namespace` with defaults.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            locale_dir: None,
            throttle_ms: default_throttle_ms(),
        }
    }

    /// Enable localization from `dir`.
    #[must_use]
    pub fn with_locale_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.locale_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Override the throttle window.
    #[must_use]
    pub fn with_throttle_ms(mut self, millis: u64) -> Self {
        self.throttle_ms = millis;
        self
    }

    /// Throttled channel window.
    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Parse options from JSON, rejecting a non-string `localeDir` with a
    /// dedicated error.
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        if let Some(found) = value.get("localeDir") {
            let kind = match found {
                Value::String(_) | Value::Null => None,
                Value::Bool(_) => Some("a boolean"),
                Value::Number(_) => Some("a number"),
                Value::Array(_) => Some("an array"),
                Value::Object(_) => Some("an object"),
            };
            if let Some(found) = kind {
                let namespace = value
                    .get("namespace")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_owned();
                return Err(ConfigError::InvalidLocaleDir { namespace, found });
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Parse options from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Self::from_json(serde_json::from_slice(bytes)?)
    }
}

/// Resolves tool namespaces to their stored [`ToolOptions`].
#[derive(Debug)]
pub struct ToolConfig<S> {
    store: S,
}

fn options_key(namespace: &str) -> String {
    format!("tools/{namespace}")
}

impl<S: OptionsStore> ToolConfig<S> {
    /// Repository over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Options stored for `namespace`, validated like [`ToolOptions::from_json`].
    ///
    /// A stored `namespace` field that disagrees with the key is overridden
    /// by the key.
    pub fn stored(&self, namespace: &str) -> Result<Option<ToolOptions>, ConfigError> {
        let Some(bytes) = self.store.read(&options_key(namespace))? else {
            return Ok(None);
        };
        let mut value: Value = serde_json::from_slice(&bytes)?;
        if let Value::Object(fields) = &mut value {
            let stored = fields.get("namespace").and_then(Value::as_str);
            if let Some(stored) = stored.filter(|stored| *stored != namespace) {
                warn!(stored, namespace, "stored tool options name another namespace");
            }
            fields.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
        }
        ToolOptions::from_json(value).map(Some)
    }

    /// Stored options for `namespace`, or defaults when none are stored.
    pub fn resolve(&self, namespace: &str) -> Result<ToolOptions, ConfigError> {
        let stored = self.stored(namespace)?;
        if stored.is_none() {
            debug!(namespace, "no stored tool options; using defaults");
        }
        Ok(stored.unwrap_or_else(|| ToolOptions::new(namespace)))
    }

    /// Persist `options` under their namespace.
    pub fn store(&self, options: &ToolOptions) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(options)?;
        self.store.write(&options_key(&options.namespace), &data)
    }
}
