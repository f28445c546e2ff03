// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host entry point: wire a tool, its store and options into a controller.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{OptionsStore, ToolConfig, ToolOptions};
use crate::controller::LifecycleController;
use crate::error::ToolError;
use crate::locale::Localization;
use crate::store::Store;
use crate::tool::Tool;

/// A tool ready to be driven by its host.
#[derive(Debug)]
pub struct ConnectedTool<St: Store> {
    /// Tool namespace.
    pub name: String,
    /// Lifecycle API the host calls into.
    pub api: LifecycleController<St>,
}

/// Connect `tool` to `store` under `options`.
///
/// Localization is enabled when `options.locale_dir` names an existing
/// directory; `localization` builds the collaborator for it. A missing
/// directory is logged and the tool runs without translations.
pub fn connect_tool<St, F>(
    options: &ToolOptions,
    store: Arc<St>,
    tool: Arc<Tool<St>>,
    localization: F,
) -> Result<ConnectedTool<St>, ToolError>
where
    St: Store,
    F: FnOnce(&Path) -> Arc<dyn Localization<St>>,
{
    let namespace = options.namespace.as_str();
    info!("{namespace}: Connecting...");

    let localization = match options.locale_dir.as_deref() {
        None => {
            warn!("{namespace}: This tool has not been localized.");
            None
        }
        Some(dir) if !dir.is_dir() => {
            warn!("{namespace}: Could not find locale files in {}", dir.display());
            None
        }
        Some(dir) => Some(localization(dir)),
    };

    info!("{namespace}: Exposing API...");
    tool.set_name(namespace);
    let mut api = LifecycleController::new(tool, store)?.with_throttle_window(options.throttle_window());
    if let Some(localization) = localization {
        api = api.localized(localization);
    }
    Ok(ConnectedTool {
        name: namespace.to_owned(),
        api,
    })
}

/// Connect `tool` under the options `config` holds for `namespace`.
///
/// Tools never configured connect with default options. Invalid stored
/// options fail before the tool or store is touched.
pub fn connect_configured<St, S, F>(
    config: &ToolConfig<S>,
    namespace: &str,
    store: Arc<St>,
    tool: Arc<Tool<St>>,
    localization: F,
) -> Result<ConnectedTool<St>, ToolError>
where
    St: Store,
    S: OptionsStore,
    F: FnOnce(&Path) -> Arc<dyn Localization<St>>,
{
    let options = config.resolve(namespace)?;
    connect_tool(&options, store, tool, localization)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locale::{CatalogLoader, LocaleAction, LocaleCatalog, LocaleError, LocaleState, StoreLocalization};
    use crate::store::ReducerStore;
    use std::time::Duration;

    type LocaleStore = ReducerStore<LocaleState, LocaleAction>;

    struct Empty;

    impl CatalogLoader for Empty {
        fn load_catalog(&self) -> Result<LocaleCatalog, LocaleError> {
            Err(LocaleError::NoTranslations {
                location: "memory".into(),
            })
        }
    }

    fn empty(_: &Path) -> Arc<dyn Localization<LocaleStore>> {
        Arc::new(StoreLocalization::new(Empty))
    }

    struct Stored(&'static [u8]);

    impl OptionsStore for Stored {
        fn read(&self, _: &str) -> Result<Option<Vec<u8>>, crate::config::ConfigError> {
            Ok(Some(self.0.to_vec()))
        }

        fn write(&self, _: &str, _: &[u8]) -> Result<(), crate::config::ConfigError> {
            Ok(())
        }
    }

    fn store() -> Arc<LocaleStore> {
        Arc::new(ReducerStore::new(LocaleState::default(), |s: &LocaleState, a: LocaleAction| {
            s.reduce(&a)
        }))
    }

    #[tokio::test]
    async fn unlocalized_tool_is_named_and_configured() {
        let tool = Tool::<LocaleStore>::builder("anonymous").build();
        let options = ToolOptions::new("wordAlignment").with_throttle_ms(250);
        let connected = connect_tool(&options, store(), Arc::clone(&tool), empty).unwrap();
        assert_eq!(connected.name, "wordAlignment");
        assert_eq!(tool.name(), "wordAlignment");
        assert!(!connected.api.has_locale());
        assert_eq!(connected.api.throttle_window(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn missing_locale_dir_disables_localization() {
        let options = ToolOptions::new("demo").with_locale_dir("/definitely/not/here");
        let mut built = false;
        let connected = connect_tool(&options, store(), Tool::<LocaleStore>::builder("demo").build(), |dir| {
            built = true;
            empty(dir)
        })
        .unwrap();
        assert!(!built);
        assert!(!connected.api.has_locale());
    }

    #[tokio::test]
    async fn locale_load_errors_surface_on_connect() {
        let dir = std::env::temp_dir();
        let options = ToolOptions::new("demo").with_locale_dir(&dir);
        let connected = connect_tool(&options, store(), Tool::<LocaleStore>::builder("demo").build(), empty).unwrap();
        assert!(connected.api.has_locale());
        let err = connected.api.connect(crate::props::Props::new()).unwrap_err();
        assert!(matches!(err, ToolError::Locale(LocaleError::NoTranslations { .. })));
        assert!(!connected.api.is_connected());
    }

    #[tokio::test]
    async fn configured_connect_uses_stored_options() {
        let config = ToolConfig::new(Stored(br#"{"namespace": "notes", "throttleMs": 40}"#));
        let tool = Tool::<LocaleStore>::builder("anonymous").build();
        let connected = connect_configured(&config, "notes", store(), tool, empty).unwrap();
        assert_eq!(connected.name, "notes");
        assert_eq!(connected.api.throttle_window(), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn invalid_stored_options_fail_before_connecting() {
        let config = ToolConfig::new(Stored(br#"{"localeDir": 3}"#));
        let tool = Tool::<LocaleStore>::builder("untouched").build();
        let err = connect_configured(&config, "notes", store(), Arc::clone(&tool), empty).unwrap_err();
        assert!(matches!(
            err,
            ToolError::Config(crate::config::ConfigError::InvalidLocaleDir { .. })
        ));
        assert_eq!(tool.name(), "untouched");
    }
}
