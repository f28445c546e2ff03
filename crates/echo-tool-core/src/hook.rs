// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hook calling convention: arguments, outcomes and errors.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinError;

use crate::props::Props;
use crate::store::{Dispatcher, Store};

/// Future returned by an asynchronous hook.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<HookReturn, HookError>> + Send + 'static>>;

/// Arguments handed to a hook; the variant depends on the lifecycle stage.
pub enum HookArgs<'a, St: Store> {
    /// No arguments (`willConnect`, `willDisconnect`).
    None,
    /// New store state and the state handed to the previous settled call.
    StateChange {
        /// Current store state.
        next: &'a St::State,
        /// State seen by the previous settled invocation, if any.
        prev: Option<&'a St::State>,
    },
    /// Store state plus the props derived so far.
    MapState {
        /// Current store state.
        state: &'a St::State,
        /// Props derived before mapping.
        props: &'a Props,
    },
    /// Store dispatcher plus the props derived so far.
    MapDispatch {
        /// Dispatches actions into the tool store.
        dispatch: &'a Dispatcher<St::Action>,
        /// Props derived before mapping.
        props: &'a Props,
    },
    /// Freshly derived props and the ones they replaced.
    ReceiveProps {
        /// Props now attached to the tool.
        next: &'a Props,
        /// Props attached before this update.
        prev: &'a Props,
    },
    /// Error raised by another hook (`didCatch`).
    Error(&'a HookError),
    /// Free-form arguments for tool-defined methods.
    Values(&'a [Value]),
}

impl<St: Store> Clone for HookArgs<'_, St> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<St: Store> Copy for HookArgs<'_, St> {}

impl<St: Store> fmt::Debug for HookArgs<'_, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::None => "None",
            Self::StateChange { .. } => "StateChange",
            Self::MapState { .. } => "MapState",
            Self::MapDispatch { .. } => "MapDispatch",
            Self::ReceiveProps { .. } => "ReceiveProps",
            Self::Error(_) => "Error",
            Self::Values(_) => "Values",
        };
        f.write_str(kind)
    }
}

/// Value a hook produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HookReturn {
    /// The hook ran and returned nothing.
    #[default]
    Nothing,
    /// Plain data.
    Value(Value),
    /// Props (used by the mapping hooks).
    Props(Props),
}

impl HookReturn {
    /// Interpret as props to merge. Falsy and non-object values contribute
    /// nothing.
    pub fn into_props(self) -> Props {
        match self {
            Self::Props(props) => props,
            Self::Value(value @ Value::Object(_)) => Props::from_json(value),
            Self::Nothing | Self::Value(_) => Props::new(),
        }
    }
}

impl From<Value> for HookReturn {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Props> for HookReturn {
    fn from(props: Props) -> Self {
        Self::Props(props)
    }
}

/// What a hook hands back: a settled result or a future still in flight.
pub enum HookOutcome {
    /// The hook completed synchronously.
    Ready(Result<HookReturn, HookError>),
    /// The hook continues asynchronously.
    Pending(HookFuture),
}

impl HookOutcome {
    /// Completed without a value.
    pub fn done() -> Self {
        Self::Ready(Ok(HookReturn::Nothing))
    }

    /// Completed with plain data.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Ready(Ok(HookReturn::Value(value.into())))
    }

    /// Completed with props.
    pub fn props(props: Props) -> Self {
        Self::Ready(Ok(HookReturn::Props(props)))
    }

    /// Failed synchronously.
    pub fn fail(error: impl Into<HookError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    /// Continue asynchronously with `fut`.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Result<HookReturn, HookError>> + Send + 'static,
    {
        Self::Pending(Box::pin(fut))
    }
}

impl From<Result<HookReturn, HookError>> for HookOutcome {
    fn from(result: Result<HookReturn, HookError>) -> Self {
        Self::Ready(result)
    }
}

impl From<anyhow::Result<()>> for HookOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        Self::Ready(result.map(|()| HookReturn::Nothing).map_err(HookError::from))
    }
}

impl fmt::Debug for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Result of asking the gate to invoke a hook.
pub enum Invocation {
    /// The tool does not implement the hook.
    Absent,
    /// The hook ran to completion.
    Ready(Result<HookReturn, HookError>),
    /// The hook is still running.
    Pending(HookFuture),
}

impl Invocation {
    /// Whether the hook was missing.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Wait for the hook to settle. `None` when the hook was absent.
    pub async fn settle(self) -> Option<Result<HookReturn, HookError>> {
        match self {
            Self::Absent => None,
            Self::Ready(result) => Some(result),
            Self::Pending(fut) => Some(fut.await),
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Failure raised inside a hook.
///
/// Cheap to clone so one failure can be handed to the error hook and logged.
#[derive(Clone)]
pub struct HookError {
    inner: Arc<anyhow::Error>,
}

impl HookError {
    /// Wrap any error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from(anyhow::Error::new(error))
    }

    /// Build from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::from(anyhow::Error::msg(message))
    }

    /// Downcast the wrapped error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    pub(crate) fn panicked(method: &str, payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::msg(format!("hook `{method}` panicked: {detail}"))
    }

    pub(crate) fn from_join(method: &str, error: JoinError) -> Self {
        if error.is_panic() {
            Self::panicked(method, error.into_panic().as_ref())
        } else {
            Self::msg(format!("hook `{method}` was cancelled"))
        }
    }
}

impl From<anyhow::Error> for HookError {
    fn from(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }
}

impl fmt::Debug for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_returns_contribute_no_props() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!("text")] {
            assert!(HookReturn::Value(value).into_props().is_empty());
        }
        assert!(HookReturn::Nothing.into_props().is_empty());
    }

    #[test]
    fn object_return_becomes_props() {
        let props = HookReturn::Value(json!({"hello": "world"})).into_props();
        assert_eq!(props.str("hello"), Some("world"));
    }

    #[test]
    fn panic_payloads_are_described() {
        let err = HookError::panicked("stateChanged", &"boom");
        assert_eq!(err.to_string(), "hook `stateChanged` panicked: boom");
        let err = HookError::panicked("stateChanged", &String::from("owned"));
        assert!(err.to_string().ends_with("owned"));
    }

    #[tokio::test]
    async fn pending_invocation_settles() {
        let invocation = Invocation::Pending(Box::pin(async { Ok(HookReturn::Value(json!(1))) }));
        let settled = invocation.settle().await.unwrap().unwrap();
        assert_eq!(settled, HookReturn::Value(json!(1)));
        assert!(Invocation::Absent.settle().await.is_none());
    }
}
