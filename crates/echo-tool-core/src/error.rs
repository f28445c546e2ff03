// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use thiserror::Error;

use crate::config::ConfigError;
use crate::hook::HookError;
use crate::locale::LocaleError;
use crate::method::InvalidMethodError;

/// Errors surfaced by the controller and `connect_tool`.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A private or reserved hook name was used.
    #[error(transparent)]
    InvalidMethod(#[from] InvalidMethodError),
    /// A mapping hook failed while computing props.
    #[error("failed to compute props: {0}")]
    Hook(#[from] HookError),
    /// Translations could not be loaded.
    #[error(transparent)]
    Locale(#[from] LocaleError),
    /// Tool options were invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// No Tokio runtime was available to drive pending hooks and timers.
    #[error("lifecycle controller requires a Tokio runtime")]
    NoRuntime,
}
