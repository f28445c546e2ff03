// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tool props and the pipeline that derives them.
//!
//! Merge order, later entries overriding earlier ones on key collision:
//! raw host input, locale fields (`translate`, `currentLanguage`, only when
//! localization is enabled), tool status fields (`name`, `isReady`,
//! `setToolLoading`, `setToolReady`, only when status tracking is enabled),
//! `mapDispatchToProps`, `mapStateToProps`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::hook::{HookArgs, HookError, HookReturn, Invocation};
use crate::loading::{
    LoadingAction, ToolStatus, IS_READY, SET_TOOL_LOADING, SET_TOOL_READY, TOOL_NAME,
};
use crate::locale::{Localization, Translate};
use crate::method::{Lifecycle, MethodGate};
use crate::store::{Dispatcher, Store};

/// Key of the translate function in locale props.
pub const TRANSLATE: &str = "translate";
/// Key of the active language code in locale props.
pub const CURRENT_LANGUAGE: &str = "currentLanguage";

/// Callable prop, e.g. an action bound through [`Dispatcher::bind`].
#[derive(Clone)]
pub struct PropCallback(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl PropCallback {
    /// Wrap a callback.
    pub fn new(callback: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Call with positional arguments.
    pub fn call(&self, args: &[Value]) {
        (self.0)(args);
    }
}

impl PartialEq for PropCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PropCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PropCallback(..)")
    }
}

/// A single prop value.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    /// Plain data.
    Value(Value),
    /// Translation function for the active language.
    Translate(Translate),
    /// Callable prop.
    Callback(PropCallback),
}

impl Prop {
    /// Data payload, if this is a data prop.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Translate(_) | Self::Callback(_) => None,
        }
    }
}

impl From<Value> for Prop {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Translate> for Prop {
    fn from(translate: Translate) -> Self {
        Self::Translate(translate)
    }
}

impl From<PropCallback> for Prop {
    fn from(callback: PropCallback) -> Self {
        Self::Callback(callback)
    }
}

/// Keyed prop bag attached to a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: BTreeMap<String, Prop>,
}

impl Props {
    /// Empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data props from a JSON object; anything else yields empty props.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().map(|(k, v)| (k, Prop::Value(v))).collect(),
            _ => Self::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Prop>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert, returning the replaced prop.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Prop>) -> Option<Prop> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up a prop.
    pub fn get(&self, key: &str) -> Option<&Prop> {
        self.entries.get(key)
    }

    /// Look up a data prop.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Prop::as_value)
    }

    /// Look up a string data prop.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    /// Look up a callable prop.
    pub fn callback(&self, key: &str) -> Option<&PropCallback> {
        match self.get(key)? {
            Prop::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// The `translate` prop, present when localization is enabled.
    pub fn translate(&self) -> Option<&Translate> {
        match self.get(TRANSLATE)? {
            Prop::Translate(t) => Some(t),
            _ => None,
        }
    }

    /// Whether `key` is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Number of props.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no props.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `other`; its entries win on collision.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Data-only JSON view (functions are skipped).
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .filter_map(|(k, p)| p.as_value().map(|v| (k.clone(), v.clone())))
            .collect();
        Value::Object(map)
    }
}

impl FromIterator<(String, Prop)> for Props {
    fn from_iter<I: IntoIterator<Item = (String, Prop)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Props {
    type Item = (String, Prop);
    type IntoIter = std::collections::btree_map::IntoIter<String, Prop>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Derives merged props for a tool from host input.
pub struct PropsPipeline<St: Store> {
    gate: MethodGate<St>,
    store: Arc<St>,
    localization: Option<Arc<dyn Localization<St>>>,
    status: Option<Arc<dyn ToolStatus<St>>>,
}

impl<St: Store> fmt::Debug for PropsPipeline<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropsPipeline")
            .field("gate", &self.gate)
            .field("localized", &self.localization.is_some())
            .field("tracks_status", &self.status.is_some())
            .finish_non_exhaustive()
    }
}

impl<St: Store> PropsPipeline<St> {
    /// Pipeline over `store`; locale fields are added when `localization` is set.
    pub fn new(
        gate: MethodGate<St>,
        store: Arc<St>,
        localization: Option<Arc<dyn Localization<St>>>,
    ) -> Self {
        Self {
            gate,
            store,
            localization,
            status: None,
        }
    }

    /// Add the tool status fields, read and changed through `status`.
    #[must_use]
    pub fn with_status(mut self, status: Option<Arc<dyn ToolStatus<St>>>) -> Self {
        self.status = status;
        self
    }

    /// Whether locale fields are produced.
    pub fn is_localized(&self) -> bool {
        self.localization.is_some()
    }

    /// Merge `raw` with locale and status fields and the mapping hooks' output.
    ///
    /// Both mapping hooks see the same base props (raw input plus locale and
    /// status fields). Errors from either hook propagate.
    pub fn compute(&self, raw: &Props) -> Result<Props, HookError> {
        let dispatch = Dispatcher::from_store(Arc::clone(&self.store));
        let mut base = raw.clone();
        if let Some(localization) = &self.localization {
            let state = self.store.state();
            let language = localization
                .active_language(&state)
                .map_or(Value::Null, |lang| Value::String(lang.code));
            base.insert(TRANSLATE, localization.translate(&state));
            base.insert(CURRENT_LANGUAGE, language);
        }
        if let Some(status) = &self.status {
            let ready = status.is_ready(&self.store.state());
            base.insert(TOOL_NAME, Value::String(self.gate.tool().name()));
            base.insert(IS_READY, Value::Bool(ready));
            let status = Arc::clone(status);
            let set_status = Arc::new(dispatch.bind(move |change: LoadingAction| status.action(change)));
            let set_loading = Arc::clone(&set_status);
            base.insert(
                SET_TOOL_LOADING,
                PropCallback::new(move |_| set_loading(LoadingAction::Loading)),
            );
            base.insert(
                SET_TOOL_READY,
                PropCallback::new(move |_| set_status(LoadingAction::Ready)),
            );
        }

        let dispatch_props = self.map(
            Lifecycle::MapDispatchToProps,
            HookArgs::MapDispatch {
                dispatch: &dispatch,
                props: &base,
            },
        )?;
        // Re-read: mapDispatchToProps may have dispatched.
        let state = self.store.state();
        let state_props = self.map(
            Lifecycle::MapStateToProps,
            HookArgs::MapState {
                state: &state,
                props: &base,
            },
        )?;

        base.merge(dispatch_props);
        base.merge(state_props);
        Ok(base)
    }

    fn map(&self, hook: Lifecycle, args: HookArgs<'_, St>) -> Result<Props, HookError> {
        match self.gate.invoke(hook, args).map_err(HookError::new)? {
            Invocation::Absent => Ok(Props::new()),
            Invocation::Ready(result) => result.map(HookReturn::into_props),
            Invocation::Pending(_) => Err(HookError::msg(format!(
                "`{hook}` returned a future; mapping hooks must complete synchronously"
            ))),
        }
    }
}
