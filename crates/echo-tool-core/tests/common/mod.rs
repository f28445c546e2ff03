// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, missing_docs)]

use std::sync::Arc;

use echo_tool_core::{
    CatalogLoader, LoadingAction, LoadingAware, LoadingState, LocaleAction, LocaleAware,
    LocaleCatalog, LocaleError, LocaleState, ReducerStore,
};
use serde_json::{json, Map};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub count: i64,
    pub locale: LocaleState,
    pub loading: LoadingState,
}

impl LocaleAware for AppState {
    fn locale(&self) -> &LocaleState {
        &self.locale
    }
}

impl LoadingAware for AppState {
    fn loading(&self) -> LoadingState {
        self.loading
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Increment,
    Locale(LocaleAction),
    Loading(LoadingAction),
}

impl From<LocaleAction> for AppAction {
    fn from(action: LocaleAction) -> Self {
        Self::Locale(action)
    }
}

impl From<LoadingAction> for AppAction {
    fn from(action: LoadingAction) -> Self {
        Self::Loading(action)
    }
}

pub type AppStore = ReducerStore<AppState, AppAction>;

pub fn app_store() -> Arc<AppStore> {
    Arc::new(ReducerStore::new(AppState::default(), |state: &AppState, action: AppAction| {
        let mut next = state.clone();
        match action {
            AppAction::Increment => next.count += 1,
            AppAction::Locale(action) => next.locale = state.locale.reduce(&action),
            AppAction::Loading(action) => next.loading = state.loading.reduce(action),
        }
        next
    }))
}

/// Catalog with English and Spanish, built in memory.
pub struct MemoryCatalog;

impl CatalogLoader for MemoryCatalog {
    fn load_catalog(&self) -> Result<LocaleCatalog, LocaleError> {
        let mut catalog = LocaleCatalog::new();
        catalog.add_translation("English-en_US.json", json!({"title": "Word Alignment"}), &Map::new())?;
        catalog.add_translation("Español-es_419.json", json!({"title": "Alineación"}), &Map::new())?;
        Ok(catalog)
    }
}
