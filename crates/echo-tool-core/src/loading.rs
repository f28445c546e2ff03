// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tool loading status.
//!
//! A tool flips its store between "loading" and "ready" through two bound
//! callbacks in its props; the pipeline reports the current status back as
//! `isReady` together with the tool's `name`.

use crate::store::Store;

/// Props key of the tool namespace.
pub const TOOL_NAME: &str = "name";
/// Props key of the ready flag.
pub const IS_READY: &str = "isReady";
/// Props key of the callback marking the tool as loading.
pub const SET_TOOL_LOADING: &str = "setToolLoading";
/// Props key of the callback marking the tool as ready.
pub const SET_TOOL_READY: &str = "setToolReady";

/// Status change requested by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingAction {
    /// The tool started loading.
    Loading,
    /// The tool finished loading.
    Ready,
}

/// Loading slice of a tool store. Tools start out ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    loading: bool,
}

impl LoadingState {
    /// Apply `action`.
    #[must_use]
    pub const fn reduce(self, action: LoadingAction) -> Self {
        Self {
            loading: matches!(action, LoadingAction::Loading),
        }
    }

    /// Whether the tool reported that it is loading.
    pub const fn is_loading(self) -> bool {
        self.loading
    }
}

/// State types that carry a [`LoadingState`].
pub trait LoadingAware {
    /// The loading slice.
    fn loading(&self) -> LoadingState;
}

impl LoadingAware for LoadingState {
    fn loading(&self) -> LoadingState {
        *self
    }
}

/// Reads and changes a tool's loading status in its store.
pub trait ToolStatus<St: Store>: Send + Sync {
    /// Whether the tool is ready in `state`.
    fn is_ready(&self, state: &St::State) -> bool;
    /// Store action applying `change`.
    fn action(&self, change: LoadingAction) -> St::Action;
}

/// [`ToolStatus`] over a store whose state embeds a [`LoadingState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreToolStatus;

impl<St> ToolStatus<St> for StoreToolStatus
where
    St: Store,
    St::State: LoadingAware,
    St::Action: From<LoadingAction>,
{
    fn is_ready(&self, state: &St::State) -> bool {
        !state.loading().is_loading()
    }

    fn action(&self, change: LoadingAction) -> St::Action {
        change.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_toggle_the_flag() {
        let state = LoadingState::default();
        assert!(!state.is_loading());
        let state = state.reduce(LoadingAction::Loading);
        assert!(state.is_loading());
        assert!(state.reduce(LoadingAction::Loading).is_loading());
        assert!(!state.reduce(LoadingAction::Ready).is_loading());
    }
}
