// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hook names and the guarded [`MethodGate`].
//!
//! Hooks are looked up by string name. Names that start with the private
//! marker (`_`) or equal the reserved constructor name are usage errors and
//! are rejected before any lookup on the tool.

use std::borrow::Borrow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::hook::{HookArgs, HookError, HookOutcome, Invocation};
use crate::store::Store;
use crate::tool::Tool;

/// Reserved name that can never be invoked as a hook.
pub const CONSTRUCTOR: &str = "constructor";

/// Prefix marking private methods.
pub const PRIVATE_PREFIX: char = '_';

/// A hook name was private or reserved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lifecycle method `{name}`: must be a public method")]
pub struct InvalidMethodError {
    name: String,
}

impl InvalidMethodError {
    /// The rejected name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Validated hook name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodName(String);

impl MethodName {
    /// Validate and wrap a hook name.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidMethodError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Check a name without allocating.
    pub fn validate(name: &str) -> Result<(), InvalidMethodError> {
        if name.starts_with(PRIVATE_PREFIX) || name == CONSTRUCTOR {
            return Err(InvalidMethodError {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MethodName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MethodName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for MethodName {
    type Error = InvalidMethodError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Lifecycle> for MethodName {
    fn from(hook: Lifecycle) -> Self {
        Self(hook.as_str().to_owned())
    }
}

/// Lifecycle hooks recognised by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Tool is being connected to its host.
    WillConnect,
    /// Tool is being disconnected from its host.
    WillDisconnect,
    /// Tool props were recomputed from new host input.
    WillReceiveProps,
    /// Store state changed (immediate channel).
    StateChanged,
    /// Store state changed (throttled channel).
    StateChangeThrottled,
    /// Maps store state to extra props.
    MapStateToProps,
    /// Maps the store dispatcher to extra props.
    MapDispatchToProps,
    /// Receives errors raised by other hooks.
    DidCatch,
}

impl Lifecycle {
    /// Every lifecycle hook, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::WillConnect,
        Self::WillDisconnect,
        Self::WillReceiveProps,
        Self::StateChanged,
        Self::StateChangeThrottled,
        Self::MapStateToProps,
        Self::MapDispatchToProps,
        Self::DidCatch,
    ];

    /// Conventional hook name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WillConnect => "willConnect",
            Self::WillDisconnect => "willDisconnect",
            Self::WillReceiveProps => "willReceiveProps",
            Self::StateChanged => "stateChanged",
            Self::StateChangeThrottled => "stateChangeThrottled",
            Self::MapStateToProps => "mapStateToProps",
            Self::MapDispatchToProps => "mapDispatchToProps",
            Self::DidCatch => "didCatch",
        }
    }
}

impl AsRef<str> for Lifecycle {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates names and invokes hooks on a tool.
///
/// The hook receives the tool itself as its receiver, so it can reach the
/// tool's props, context and update listeners.
pub struct MethodGate<St: Store> {
    tool: Arc<Tool<St>>,
}

impl<St: Store> Clone for MethodGate<St> {
    fn clone(&self) -> Self {
        Self {
            tool: Arc::clone(&self.tool),
        }
    }
}

impl<St: Store> fmt::Debug for MethodGate<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodGate")
            .field("tool", &self.tool.name())
            .finish()
    }
}

impl<St: Store> MethodGate<St> {
    /// Gate hooks on `tool`.
    pub fn new(tool: Arc<Tool<St>>) -> Self {
        Self { tool }
    }

    /// The gated tool.
    pub fn tool(&self) -> &Arc<Tool<St>> {
        &self.tool
    }

    /// Whether the tool implements `name`. Invalid names never exist.
    pub fn exists(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        MethodName::validate(name).is_ok() && self.tool.has_hook(name)
    }

    /// Invoke `name` with `args`.
    ///
    /// Returns [`Invocation::Absent`] when the tool does not implement the
    /// hook. A panic inside the hook body is reported as a failed invocation.
    pub fn invoke(
        &self,
        name: impl AsRef<str>,
        args: HookArgs<'_, St>,
    ) -> Result<Invocation, InvalidMethodError> {
        let name = name.as_ref();
        MethodName::validate(name)?;
        let Some(hook) = self.tool.hook(name) else {
            return Ok(Invocation::Absent);
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(&*self.tool, args)));
        Ok(match outcome {
            Ok(HookOutcome::Ready(result)) => Invocation::Ready(result),
            Ok(HookOutcome::Pending(fut)) => Invocation::Pending(fut),
            Err(payload) => Invocation::Ready(Err(HookError::panicked(name, payload.as_ref()))),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::hook::HookReturn;
    use crate::store::ReducerStore;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestStore = ReducerStore<i64, i64>;

    fn counting_tool(calls: &Arc<AtomicUsize>) -> Arc<Tool<TestStore>> {
        let hello = Arc::clone(calls);
        let quiet = Arc::clone(calls);
        Tool::<TestStore>::builder("counting")
            .method("hello", move |_, _| {
                hello.fetch_add(1, Ordering::SeqCst);
                HookOutcome::value(json!("world"))
            })
            .unwrap()
            .method("quiet", move |_, _| {
                quiet.fetch_add(1, Ordering::SeqCst);
                HookOutcome::done()
            })
            .unwrap()
            .build()
    }

    #[test]
    fn invokes_existing_method() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = MethodGate::new(counting_tool(&calls));
        match gate.invoke("hello", HookArgs::None).unwrap() {
            Invocation::Ready(Ok(HookReturn::Value(v))) => assert_eq!(v, json!("world")),
            other => panic!("unexpected invocation: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_method_is_distinguishable_only_via_exists() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = MethodGate::new(counting_tool(&calls));
        assert!(!gate.exists("missing"));
        assert!(gate.invoke("missing", HookArgs::None).unwrap().is_absent());
        assert!(gate.exists("quiet"));
        assert!(matches!(
            gate.invoke("quiet", HookArgs::None).unwrap(),
            Invocation::Ready(Ok(HookReturn::Nothing))
        ));
    }

    #[test]
    fn constructor_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = MethodGate::new(counting_tool(&calls));
        let err = gate.invoke(CONSTRUCTOR, HookArgs::None).unwrap_err();
        assert_eq!(err.name(), "constructor");
        assert!(!gate.exists(CONSTRUCTOR));
    }

    #[test]
    fn panicking_hook_becomes_hook_error() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("panicky")
            .on(Lifecycle::WillConnect, |_, _| panic!("boom"))
            .build();
        let gate = MethodGate::new(tool);
        match gate.invoke(Lifecycle::WillConnect, HookArgs::None).unwrap() {
            Invocation::Ready(Err(e)) => assert!(e.to_string().contains("boom")),
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn lifecycle_names_are_valid_method_names() {
        for hook in Lifecycle::ALL {
            assert_eq!(MethodName::new(hook.as_str()).unwrap(), MethodName::from(hook));
        }
    }

    proptest! {
        #[test]
        fn private_names_never_reach_the_tool(suffix in "[a-zA-Z0-9_]{0,16}") {
            let calls = Arc::new(AtomicUsize::new(0));
            let gate = MethodGate::new(counting_tool(&calls));
            let name = format!("_{suffix}");
            prop_assert!(gate.invoke(&name, HookArgs::None).is_err());
            prop_assert!(!gate.exists(&name));
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn public_names_validate(name in "[a-zA-Z][a-zA-Z0-9_]{0,16}") {
            prop_assume!(name != CONSTRUCTOR);
            prop_assert!(MethodName::new(name).is_ok());
        }
    }
}
