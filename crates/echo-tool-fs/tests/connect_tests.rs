// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use echo_tool_core::{
    connect_configured, connect_tool, LocaleAction, LocaleState, Localization, Props,
    ReducerStore, StoreLocalization, Tool, ToolConfig, ToolOptions, APP_LANGUAGE,
};
use echo_tool_fs::{FsCatalogLoader, FsConfigStore};
use serde_json::json;

type LocaleStore = ReducerStore<LocaleState, LocaleAction>;

fn store() -> Arc<LocaleStore> {
    Arc::new(ReducerStore::new(LocaleState::default(), |s: &LocaleState, a: LocaleAction| {
        s.reduce(&a)
    }))
}

fn localization(dir: &Path) -> Arc<dyn Localization<LocaleStore>> {
    Arc::new(StoreLocalization::new(FsCatalogLoader::new(dir)))
}

#[tokio::test]
async fn locale_dir_drives_tool_translations() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("English-en_US.json"), r#"{"save": "Save"}"#).unwrap();
    fs::write(dir.path().join("Deutsch-de_DE.json"), r#"{"save": "Speichern"}"#).unwrap();

    let tool: Arc<Tool<LocaleStore>> = Tool::<LocaleStore>::builder("anonymous").build();
    let options = ToolOptions::new("translationNotes").with_locale_dir(dir.path());
    let connected = connect_tool(&options, store(), Arc::clone(&tool), localization).unwrap();
    assert_eq!(connected.name, "translationNotes");
    assert!(connected.api.has_locale());

    connected
        .api
        .connect(Props::from_json(json!({APP_LANGUAGE: "de_AT"})))
        .unwrap();
    let props = tool.props();
    assert_eq!(props.str("currentLanguage"), Some("de_DE"));
    assert_eq!(props.translate().unwrap().get("save"), "Speichern");
    assert_eq!(props.translate().unwrap().get("_.language_name"), "Deutsch");
    connected.api.disconnect();
}

#[tokio::test]
async fn tool_without_locale_files_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("README.md"), "no catalogs yet").unwrap();
    let options = ToolOptions::new("empty").with_locale_dir(dir.path());
    let connected =
        connect_tool(&options, store(), Tool::<LocaleStore>::builder("empty").build(), localization).unwrap();
    assert!(connected.api.connect(Props::new()).is_err());
}

#[tokio::test]
async fn stored_options_configure_the_connection() {
    let locale = tempfile::tempdir().unwrap();
    fs::write(locale.path().join("English-en_US.json"), r#"{"save": "Save"}"#).unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let config = ToolConfig::new(FsConfigStore::at(config_dir.path()).unwrap());
    config
        .store(
            &ToolOptions::new("translationWords")
                .with_locale_dir(locale.path())
                .with_throttle_ms(300),
        )
        .unwrap();

    let tool: Arc<Tool<LocaleStore>> = Tool::<LocaleStore>::builder("anonymous").build();
    let connected =
        connect_configured(&config, "translationWords", store(), Arc::clone(&tool), localization)
            .unwrap();
    assert_eq!(connected.name, "translationWords");
    assert_eq!(connected.api.throttle_window().as_millis(), 300);
    connected.api.connect(Props::new()).unwrap();
    assert_eq!(tool.props().translate().unwrap().get("save"), "Save");

    let fresh = connect_configured(
        &config,
        "unconfigured",
        store(),
        Tool::<LocaleStore>::builder("fresh").build(),
        localization,
    )
    .unwrap();
    assert!(!fresh.api.has_locale());
}
