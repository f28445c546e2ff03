// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! echo-tool-core: binds an isolated tool to a host store.
//!
//! A [`Tool`] registers optional lifecycle hooks by name. The
//! [`LifecycleController`] owns the tool's connection to a [`Store`]:
//!
//! - hooks are invoked through the [`MethodGate`], which rejects private and
//!   reserved names before touching the tool;
//! - store notifications feed the `stateChanged` hook immediately and the
//!   `stateChangeThrottled` hook through a trailing-edge [`Throttle`], both
//!   guarded by the [`BlockingInvoker`] (at most one in-flight call per hook,
//!   later triggers are dropped while one is pending);
//! - every connect / input change recomputes the tool's [`Props`] through the
//!   [`PropsPipeline`] (raw input, locale fields, `mapDispatchToProps`,
//!   `mapStateToProps`, later entries winning), optionally adding the tool's
//!   loading status and callbacks that change it.
//!
//! Hook failures never escape the invoker; they are routed to the tool's
//! `didCatch` hook, or logged when the tool does not implement one.

pub mod blocking;
pub mod bridge;
pub mod config;
pub mod connect;
pub mod controller;
mod error;
pub mod hook;
pub mod loading;
pub mod locale;
pub mod method;
pub mod props;
pub mod store;
pub mod throttle;
pub mod tool;

pub use blocking::{BlockSet, BlockingInvoker, Trigger};
pub use bridge::StoreBridge;
pub use config::{ConfigError, OptionsStore, ToolConfig, ToolOptions};
pub use connect::{connect_configured, connect_tool, ConnectedTool};
pub use controller::{LifecycleController, APP_LANGUAGE};
pub use error::ToolError;
pub use hook::{HookArgs, HookError, HookFuture, HookOutcome, HookReturn, Invocation};
pub use loading::{
    LoadingAction, LoadingAware, LoadingState, StoreToolStatus, ToolStatus, IS_READY,
    SET_TOOL_LOADING, SET_TOOL_READY, TOOL_NAME,
};
pub use locale::{
    CatalogLoader, Language, LocaleAction, LocaleAware, LocaleCatalog, LocaleError, LocaleState,
    Localization, StoreLocalization, Translate, DEFAULT_LOCALE,
};
pub use method::{InvalidMethodError, Lifecycle, MethodGate, MethodName};
pub use props::{Prop, PropCallback, Props, PropsPipeline};
pub use store::{Dispatcher, Listener, ReducerStore, Store, Subscription};
pub use throttle::Throttle;
pub use tool::{Hook, Tool, ToolBuilder, ToolContext};
