// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem adapters for Echo tools: per-tool options under the platform
//! config dir, locale catalogs read from a tool's locale directory, and the
//! process locale.

mod catalog;

use directories::ProjectDirs;
use echo_tool_core::config::{ConfigError, OptionsStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use catalog::{fs_localization, parse_locale, system_locale, FsCatalogLoader};

/// Tool options kept as one JSON file per key (`<root>/tools/<namespace>.json`).
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: PathBuf,
}

impl FsConfigStore {
    /// Store under the user config directory (e.g., `~/.config/EchoTools`).
    pub fn user() -> Result<Self, ConfigError> {
        let dirs =
            ProjectDirs::from("dev", "flyingrobots", "EchoTools").ok_or(ConfigError::NoConfigDir)?;
        Self::at(dirs.config_dir())
    }

    /// Store under `root`, creating it if needed.
    pub fn at(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the option files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file(&self, key: &str, suffix: &str) -> PathBuf {
        let mut file = self.root.join(key).into_os_string();
        file.push(suffix);
        PathBuf::from(file)
    }
}

impl OptionsStore for FsConfigStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        match fs::read(self.file(key, ".json")) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let file = self.file(key, ".json");
        if let Some(dir) = file.parent() {
            fs::create_dir_all(dir)?;
        }
        // Readers never observe a half-written file.
        let staged = self.file(key, ".json.tmp");
        fs::write(&staged, data)?;
        fs::rename(&staged, &file)?;
        debug!(file = %file.display(), "tool options written");
        Ok(())
    }
}
