// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The tool object: a named bag of optional hooks plus the props and store
//! context the controller attaches to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::hook::{HookArgs, HookOutcome};
use crate::method::{InvalidMethodError, Lifecycle, MethodName};
use crate::props::Props;
use crate::store::{ListenerSet, Store, Subscription};

/// A hook body. Receives the tool it is registered on.
pub type Hook<St> = Arc<dyn Fn(&Tool<St>, HookArgs<'_, St>) -> HookOutcome + Send + Sync>;

/// Store context made available to a connected tool.
pub struct ToolContext<St: Store> {
    store: Arc<St>,
}

impl<St: Store> ToolContext<St> {
    /// Context over `store`.
    pub fn new(store: Arc<St>) -> Self {
        Self { store }
    }

    /// The tool's store.
    pub fn store(&self) -> &Arc<St> {
        &self.store
    }
}

impl<St: Store> Clone for ToolContext<St> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<St: Store> fmt::Debug for ToolContext<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ToolContext(..)")
    }
}

/// An isolated tool.
///
/// Hooks are fixed at build time. Name, props and context are written by the
/// controller during connect and input updates.
pub struct Tool<St: Store> {
    name: RwLock<String>,
    hooks: HashMap<MethodName, Hook<St>>,
    props: RwLock<Props>,
    context: RwLock<Option<ToolContext<St>>>,
    listeners: Arc<Mutex<ListenerSet>>,
}

impl<St: Store> Tool<St> {
    /// Start building a tool called `name`.
    pub fn builder(name: impl Into<String>) -> ToolBuilder<St> {
        ToolBuilder {
            name: name.into(),
            hooks: HashMap::new(),
        }
    }

    /// Display name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Props currently attached.
    pub fn props(&self) -> Props {
        self.props.read().clone()
    }

    /// Replace the props, returning the previous ones.
    pub(crate) fn set_props(&self, props: Props) -> Props {
        std::mem::replace(&mut *self.props.write(), props)
    }

    /// Store context, once connected to a controller.
    pub fn context(&self) -> Option<ToolContext<St>> {
        self.context.read().clone()
    }

    /// The tool's store, once connected to a controller.
    pub fn store(&self) -> Option<Arc<St>> {
        self.context.read().as_ref().map(|ctx| Arc::clone(ctx.store()))
    }

    pub(crate) fn set_context(&self, context: ToolContext<St>) {
        *self.context.write() = Some(context);
    }

    pub(crate) fn hook(&self, name: &str) -> Option<Hook<St>> {
        self.hooks.get(name).cloned()
    }

    /// Whether a hook called `name` is registered.
    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Registered hook names, sorted.
    pub fn hook_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(MethodName::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Observe [`Tool::tool_did_update`] notifications.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        ListenerSet::register(&self.listeners, Arc::new(listener))
    }

    /// Tell observers the tool changed.
    pub fn tool_did_update(&self) {
        let listeners = self.listeners.lock().snapshot();
        for listener in listeners {
            listener();
        }
    }
}

impl<St: Store> fmt::Debug for Tool<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &*self.name.read())
            .field("hooks", &self.hook_names())
            .field("props", &self.props.read().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Tool`].
pub struct ToolBuilder<St: Store> {
    name: String,
    hooks: HashMap<MethodName, Hook<St>>,
}

impl<St: Store> ToolBuilder<St> {
    /// Register a lifecycle hook.
    #[must_use]
    pub fn on<F>(mut self, hook: Lifecycle, body: F) -> Self
    where
        F: Fn(&Tool<St>, HookArgs<'_, St>) -> HookOutcome + Send + Sync + 'static,
    {
        self.hooks.insert(MethodName::from(hook), Arc::new(body));
        self
    }

    /// Register a tool-defined method. Private and reserved names are rejected.
    pub fn method<F>(mut self, name: &str, body: F) -> Result<Self, InvalidMethodError>
    where
        F: Fn(&Tool<St>, HookArgs<'_, St>) -> HookOutcome + Send + Sync + 'static,
    {
        self.hooks.insert(MethodName::new(name)?, Arc::new(body));
        Ok(self)
    }

    /// Finish the tool.
    pub fn build(self) -> Arc<Tool<St>> {
        Arc::new(Tool {
            name: RwLock::new(self.name),
            hooks: self.hooks,
            props: RwLock::new(Props::new()),
            context: RwLock::new(None),
            listeners: Arc::new(Mutex::new(ListenerSet::default())),
        })
    }
}

impl<St: Store> fmt::Debug for ToolBuilder<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBuilder")
            .field("name", &self.name)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
