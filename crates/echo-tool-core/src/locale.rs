// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tool localization: translation catalogs, the locale slice of tool state,
//! and the [`Localization`] port the controller drives.
//!
//! Catalog files are named `<Language Name>-<code>.json` (for example
//! `English-en_US.json`). Each translation gets a `_` section holding
//! `language_name`, `locale`, `short_locale` and any non-translatable
//! strings. A short code (`en`) is registered alongside the full code unless a
//! file already claimed it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::store::Store;

/// Locale used when nothing else matches.
pub const DEFAULT_LOCALE: &str = "en_US";

/// File whose strings are merged into every translation's `_` section.
pub const NON_TRANSLATABLE_FILE: &str = "nonTranslatable.json";

/// Key of the metadata section inside a translation.
const META_KEY: &str = "_";

/// Errors raised while loading translations.
#[derive(Debug, Error)]
pub enum LocaleError {
    /// Locale directory does not exist.
    #[error("tool missing locale dir at {dir}")]
    MissingDir {
        /// Directory that was looked up.
        dir: PathBuf,
    },
    /// No usable translation was found.
    #[error("tool found no localization files in {location}")]
    NoTranslations {
        /// Where the loader looked.
        location: String,
    },
    /// File name is not `<Language Name>-<code>.json`.
    #[error("invalid localization file name `{file}`")]
    InvalidFileName {
        /// Offending file name.
        file: String,
    },
    /// Translation file does not hold a JSON object.
    #[error("localization file `{file}` must contain a JSON object")]
    NotAnObject {
        /// Offending file name.
        file: String,
    },
    /// Reading a file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A file was not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// A language a tool can be displayed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Locale code, e.g. `en_US` or `en`.
    pub code: String,
    /// Human readable name, e.g. `English`.
    pub name: String,
}

/// Pieces of a catalog file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocaleFileName {
    name: String,
    code: String,
    short_code: String,
}

fn explode_locale_name(file_name: &str) -> Result<LocaleFileName, LocaleError> {
    let invalid = || LocaleError::InvalidFileName {
        file: file_name.to_owned(),
    };
    let title = file_name.strip_suffix(".json").unwrap_or(file_name);
    let mut parts = title.split('-');
    let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let code = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let short_code = code.split('_').next().unwrap_or(code);
    Ok(LocaleFileName {
        name: name.to_owned(),
        code: code.to_owned(),
        short_code: short_code.to_owned(),
    })
}

/// Every translation a tool ships, keyed by locale code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleCatalog {
    languages: Vec<Language>,
    translations: BTreeMap<String, Arc<Value>>,
}

impl LocaleCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the translation read from `file_name`.
    ///
    /// `non_translatable` is merged into the translation's `_` section after
    /// the generated metadata, so it may override it.
    pub fn add_translation(
        &mut self,
        file_name: &str,
        translation: Value,
        non_translatable: &Map<String, Value>,
    ) -> Result<(), LocaleError> {
        let parts = explode_locale_name(file_name)?;
        let Value::Object(mut translation) = translation else {
            return Err(LocaleError::NotAnObject {
                file: file_name.to_owned(),
            });
        };

        let mut meta = Map::new();
        meta.insert("language_name".into(), Value::String(parts.name.clone()));
        meta.insert("short_locale".into(), Value::String(parts.short_code.clone()));
        meta.insert("locale".into(), Value::String(parts.code.clone()));
        meta.extend(non_translatable.iter().map(|(k, v)| (k.clone(), v.clone())));
        translation.insert(META_KEY.into(), Value::Object(meta));
        let translation = Arc::new(Value::Object(translation));

        self.register(&parts.code, &parts.name, Arc::clone(&translation));
        if !self.contains(&parts.short_code) {
            self.register(&parts.short_code, &parts.name, translation);
        }
        Ok(())
    }

    fn register(&mut self, code: &str, name: &str, translation: Arc<Value>) {
        if self.translations.insert(code.to_owned(), translation).is_none() {
            self.languages.push(Language {
                code: code.to_owned(),
                name: name.to_owned(),
            });
        }
    }

    /// Whether `code` has a translation.
    pub fn contains(&self, code: &str) -> bool {
        self.translations.contains_key(code)
    }

    /// Registered languages, in load order.
    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    /// Language entry for `code`.
    pub fn language(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == code)
    }

    /// Translation for `code`.
    pub fn translation(&self, code: &str) -> Option<&Arc<Value>> {
        self.translations.get(code)
    }

    /// Whether nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    /// Match `locale` exactly, else through its short code to the full
    /// locale that registered it.
    pub fn resolve(&self, locale: &str) -> Option<String> {
        if self.contains(locale) {
            return Some(locale.to_owned());
        }
        let short = locale.split('_').next()?;
        self.translation(short)?
            .get(META_KEY)?
            .get("locale")?
            .as_str()
            .map(str::to_owned)
    }
}

/// Locale actions a tool store must accept.
#[derive(Debug, Clone, PartialEq)]
pub enum LocaleAction {
    /// Install a catalog and select the default language.
    Initialize(Arc<LocaleCatalog>),
    /// Switch the active language (ignored for unknown codes).
    SetActive(String),
    /// Loading finished.
    Loaded,
}

/// Locale slice of a tool's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleState {
    catalog: Arc<LocaleCatalog>,
    active: Option<String>,
    loaded: bool,
}

impl LocaleState {
    /// Apply a locale action.
    pub fn reduce(&self, action: &LocaleAction) -> Self {
        let mut next = self.clone();
        match action {
            LocaleAction::Initialize(catalog) => {
                next.active = if catalog.contains(DEFAULT_LOCALE) {
                    Some(DEFAULT_LOCALE.to_owned())
                } else {
                    catalog.languages().first().map(|l| l.code.clone())
                };
                next.catalog = Arc::clone(catalog);
            }
            LocaleAction::SetActive(code) => {
                if next.catalog.contains(code) {
                    next.active = Some(code.clone());
                }
            }
            LocaleAction::Loaded => next.loaded = true,
        }
        next
    }

    /// Installed catalog.
    pub fn catalog(&self) -> &Arc<LocaleCatalog> {
        &self.catalog
    }

    /// Active language, if any.
    pub fn active_language(&self) -> Option<Language> {
        let code = self.active.as_deref()?;
        self.catalog.language(code).cloned()
    }

    /// Translate function for the active language.
    pub fn translate(&self) -> Translate {
        let translation = self
            .active
            .as_deref()
            .and_then(|code| self.catalog.translation(code))
            .cloned();
        Translate {
            translation,
            language: self.active.clone(),
        }
    }

    /// Whether loading has finished.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// State types that carry a [`LocaleState`].
pub trait LocaleAware {
    /// The locale slice.
    fn locale(&self) -> &LocaleState;
}

impl LocaleAware for LocaleState {
    fn locale(&self) -> &LocaleState {
        self
    }
}

/// Looks up strings in one language.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Translate {
    translation: Option<Arc<Value>>,
    language: Option<String>,
}

impl Translate {
    /// Language this function translates into.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Look up `key`; dots descend into nested sections (`_.locale`).
    ///
    /// Missing keys are logged and rendered as a visible placeholder.
    pub fn get(&self, key: &str) -> String {
        let found = self.translation.as_deref().and_then(|root| {
            key.split('.')
                .try_fold(root, |node, part| node.get(part))
                .and_then(Value::as_str)
        });
        if let Some(text) = found {
            return text.to_owned();
        }
        let language = self.language.as_deref().unwrap_or("none");
        error!(key, language, "tool missing locale key");
        format!("Missing translation_key:{key} for language:{language}")
    }

    /// Look up `key` and substitute `${name}` placeholders.
    pub fn get_with(&self, key: &str, data: &[(&str, &str)]) -> String {
        data.iter().fold(self.get(key), |text, (name, value)| {
            text.replace(&format!("${{{name}}}"), value)
        })
    }
}

/// Source of a tool's translations.
pub trait CatalogLoader: Send + Sync {
    /// Load every translation. An empty result is an error.
    fn load_catalog(&self) -> Result<LocaleCatalog, LocaleError>;
}

/// Localization collaborator driven by the controller.
pub trait Localization<St: Store>: Send + Sync {
    /// Load translations into `store` and activate `language` (falling back
    /// to the system locale, then [`DEFAULT_LOCALE`]).
    fn load(&self, store: &St, language: Option<&str>) -> Result<(), LocaleError>;
    /// Switch the active language, with the same fallback as [`Self::load`].
    fn set_language(&self, store: &St, code: &str);
    /// Translate function for the active language.
    fn translate(&self, state: &St::State) -> Translate;
    /// Active language, if any.
    fn active_language(&self, state: &St::State) -> Option<Language>;
    /// Whether loading has finished.
    fn is_loaded(&self, state: &St::State) -> bool;
}

/// [`Localization`] backed by the tool store's [`LocaleState`].
pub struct StoreLocalization<L> {
    loader: L,
    system_locale: Option<String>,
}

impl<L: CatalogLoader> StoreLocalization<L> {
    /// Localization reading catalogs from `loader`.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            system_locale: None,
        }
    }

    /// Locale tried when the requested one is unavailable.
    #[must_use]
    pub fn with_system_locale(mut self, locale: Option<String>) -> Self {
        self.system_locale = locale;
        self
    }

    fn activate<St>(&self, store: &St, requested: Option<&str>, catalog: &LocaleCatalog)
    where
        St: Store,
        St::Action: From<LocaleAction>,
    {
        let candidates = [requested, self.system_locale.as_deref(), Some(DEFAULT_LOCALE)];
        for code in candidates.into_iter().flatten() {
            let Some(resolved) = catalog.resolve(code) else {
                error!(locale = code, "tool found no translations for locale");
                continue;
            };
            if resolved != code {
                info!(locale = %resolved, "using equivalent locale");
            }
            if Some(code) != requested {
                warn!(requested = ?requested, fallback = code, "tool could not find locale; falling back");
            }
            store.dispatch(LocaleAction::SetActive(resolved).into());
            return;
        }
        error!("tool was unable to find suitable locale");
    }
}

impl<L> fmt::Debug for StoreLocalization<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreLocalization")
            .field("system_locale", &self.system_locale)
            .finish_non_exhaustive()
    }
}

impl<St, L> Localization<St> for StoreLocalization<L>
where
    St: Store,
    St::State: LocaleAware,
    St::Action: From<LocaleAction>,
    L: CatalogLoader,
{
    fn load(&self, store: &St, language: Option<&str>) -> Result<(), LocaleError> {
        let catalog = Arc::new(self.loader.load_catalog()?);
        store.dispatch(LocaleAction::Initialize(Arc::clone(&catalog)).into());
        if language != Some(DEFAULT_LOCALE) {
            self.activate(store, language, &catalog);
        }
        store.dispatch(LocaleAction::Loaded.into());
        Ok(())
    }

    fn set_language(&self, store: &St, code: &str) {
        let catalog = Arc::clone(store.state().locale().catalog());
        self.activate(store, Some(code), &catalog);
    }

    fn translate(&self, state: &St::State) -> Translate {
        state.locale().translate()
    }

    fn active_language(&self, state: &St::State) -> Option<Language> {
        state.locale().active_language()
    }

    fn is_loaded(&self, state: &St::State) -> bool {
        state.locale().is_loaded()
    }
}
