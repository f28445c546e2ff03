// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Locale catalogs from disk.

use std::fs;
use std::path::{Path, PathBuf};

use echo_tool_core::locale::{
    CatalogLoader, LocaleCatalog, LocaleError, StoreLocalization, NON_TRANSLATABLE_FILE,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Reads `<Language Name>-<code>.json` files from one directory.
#[derive(Debug, Clone)]
pub struct FsCatalogLoader {
    dir: PathBuf,
}

impl FsCatalogLoader {
    /// Loader over `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Locale directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json(path: &Path) -> Result<Value, LocaleError> {
        let bytes = fs::read(path).map_err(|source| LocaleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| LocaleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn non_translatable(&self) -> Map<String, Value> {
        let path = self.dir.join(NON_TRANSLATABLE_FILE);
        if !path.is_file() {
            return Map::new();
        }
        match Self::read_json(&path) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %path.display(), "non-translatable strings must be a JSON object");
                Map::new()
            }
            Err(err) => {
                warn!(%err, "tool failed to load non-translatable strings");
                Map::new()
            }
        }
    }
}

impl CatalogLoader for FsCatalogLoader {
    fn load_catalog(&self) -> Result<LocaleCatalog, LocaleError> {
        if !self.dir.is_dir() {
            return Err(LocaleError::MissingDir {
                dir: self.dir.clone(),
            });
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| LocaleError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        files.sort();

        let non_translatable = self.non_translatable();
        let mut catalog = LocaleCatalog::new();
        for file in files {
            if !file.ends_with(".json") {
                // Readmes and script sidecars are expected next to the catalogs.
                if !file.ends_with(".md") && !file.ends_with(".js") {
                    warn!(file = %file, "tool skipping invalid localization file");
                }
                continue;
            }
            if file == NON_TRANSLATABLE_FILE {
                continue;
            }
            let path = self.dir.join(&file);
            let loaded = Self::read_json(&path)
                .and_then(|translation| catalog.add_translation(&file, translation, &non_translatable));
            match loaded {
                Ok(()) => debug!(file = %file, "loaded localization"),
                Err(err) => warn!(path = %path.display(), %err, "tool failed to load localization"),
            }
        }

        if catalog.is_empty() {
            return Err(LocaleError::NoTranslations {
                location: self.dir.display().to_string(),
            });
        }
        Ok(catalog)
    }
}

/// Normalise a POSIX locale string (`de_DE.UTF-8@euro` becomes `de_DE`).
///
/// `C`, `POSIX` and empty values carry no language and yield `None`.
pub fn parse_locale(raw: &str) -> Option<String> {
    let locale = raw
        .split(['.', '@'])
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())?;
    if locale == "C" || locale == "POSIX" {
        return None;
    }
    Some(locale.replace('-', "_"))
}

/// Process locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, in that order.
pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|raw| parse_locale(&raw))
}

/// Store-backed localization reading catalogs from `dir`, falling back to the
/// process locale.
pub fn fs_localization(dir: impl AsRef<Path>) -> StoreLocalization<FsCatalogLoader> {
    StoreLocalization::new(FsCatalogLoader::new(dir)).with_system_locale(system_locale())
}
