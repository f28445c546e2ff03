// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lifecycle controller: connects one tool to its store and host.
//!
//! ```text
//! Disconnected --connect--> Connected --disconnect--> Disconnected
//!                   ^                                      |
//!                   +--------------------------------------+
//! ```
//!
//! While connected every store notification triggers `stateChanged` and,
//! through the throttle, `stateChangeThrottled`. Both go through the
//! [`BlockingInvoker`]; their failures are routed to [`LifecycleController::report_error`].
//! The connect, disconnect and input hooks are never blocked; when they
//! return a future the controller drives it itself.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn};

use crate::blocking::{BlockingInvoker, Trigger};
use crate::bridge::StoreBridge;
use crate::error::ToolError;
use crate::hook::{HookArgs, HookError, Invocation};
use crate::loading::ToolStatus;
use crate::locale::Localization;
use crate::method::{InvalidMethodError, Lifecycle, MethodGate};
use crate::props::{Props, PropsPipeline};
use crate::store::{Store, Subscription};
use crate::throttle::DEFAULT_WINDOW;
use crate::tool::{Tool, ToolContext};

/// Input key carrying the host's UI language.
pub const APP_LANGUAGE: &str = "appLanguage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Immediate,
    Throttled,
}

impl Channel {
    const fn hook(self) -> Lifecycle {
        match self {
            Self::Immediate => Lifecycle::StateChanged,
            Self::Throttled => Lifecycle::StateChangeThrottled,
        }
    }
}

struct Core<St: Store> {
    tool: Arc<Tool<St>>,
    store: Arc<St>,
    gate: MethodGate<St>,
    invoker: BlockingInvoker<St>,
    pipeline: PropsPipeline<St>,
    localization: Option<Arc<dyn Localization<St>>>,
    status: Option<Arc<dyn ToolStatus<St>>>,
    runtime: Handle,
    prev_state: Mutex<Option<St::State>>,
    prev_state_throttled: Mutex<Option<St::State>>,
    last_language: Mutex<Option<String>>,
}

impl<St: Store> Core<St> {
    fn new(
        tool: Arc<Tool<St>>,
        store: Arc<St>,
        runtime: Handle,
        localization: Option<Arc<dyn Localization<St>>>,
        status: Option<Arc<dyn ToolStatus<St>>>,
    ) -> Self {
        let gate = MethodGate::new(Arc::clone(&tool));
        Self {
            invoker: BlockingInvoker::new(gate.clone(), runtime.clone()),
            pipeline: PropsPipeline::new(gate.clone(), Arc::clone(&store), localization.clone())
                .with_status(status.clone()),
            tool,
            store,
            gate,
            localization,
            status,
            runtime,
            prev_state: Mutex::new(None),
            prev_state_throttled: Mutex::new(None),
            last_language: Mutex::new(None),
        }
    }

    fn snapshot(&self, channel: Channel) -> &Mutex<Option<St::State>> {
        match channel {
            Channel::Immediate => &self.prev_state,
            Channel::Throttled => &self.prev_state_throttled,
        }
    }

    fn invoke(&self, hook: Lifecycle, args: HookArgs<'_, St>) -> Invocation {
        // Lifecycle names always validate.
        self.gate
            .invoke(hook, args)
            .unwrap_or_else(|err| Invocation::Ready(Err(HookError::new(err))))
    }

    /// Invoke a non-blocking hook. A pending body is driven on the runtime
    /// whether or not the caller awaits the returned future; its failure is
    /// also routed to `didCatch`.
    fn invoke_detached(self: &Arc<Self>, hook: Lifecycle, args: HookArgs<'_, St>) -> Invocation {
        let invocation = self.invoke(hook, args);
        self.drive(hook.as_str(), invocation)
    }

    fn drive(self: &Arc<Self>, method: &str, invocation: Invocation) -> Invocation {
        let fut = match invocation {
            Invocation::Pending(fut) => fut,
            settled => return settled,
        };
        let method = method.to_owned();
        let core = Arc::clone(self);
        let runtime = self.runtime.clone();
        let handle = self.runtime.spawn(async move {
            let result = match runtime.spawn(fut).await {
                Ok(result) => result,
                Err(join) => Err(HookError::from_join(&method, join)),
            };
            if let Err(err) = &result {
                debug!(hook = %method, error = %err, "pending hook failed");
                core.report_error(err);
            }
            result
        });
        Invocation::Pending(Box::pin(async move {
            handle
                .await
                .unwrap_or_else(|join| Err(HookError::from_join("lifecycle driver", join)))
        }))
    }

    fn handle_store_change(self: &Arc<Self>, channel: Channel) {
        let next = self.store.state();
        let prev = self.snapshot(channel).lock().clone();
        let settled_state = next.clone();
        let core = Arc::clone(self);
        let on_settled = move |err: Option<HookError>| {
            *core.snapshot(channel).lock() = Some(settled_state);
            if let Some(err) = err {
                core.report_error(&err);
            }
        };
        let args = HookArgs::StateChange {
            next: &next,
            prev: prev.as_ref(),
        };
        match self.invoker.trigger_blocking(channel.hook(), args, on_settled) {
            Ok(Trigger::Dropped) => debug!(hook = %channel.hook(), "state change dropped while hook in flight"),
            Ok(Trigger::Settled | Trigger::Pending) => {}
            Err(err) => error!(%err, "state change hook rejected"),
        }
    }

    fn report_error(&self, err: &HookError) {
        let tool = self.tool.name();
        match self.invoke(Lifecycle::DidCatch, HookArgs::Error(err)) {
            Invocation::Absent => warn!(
                %tool,
                error = %err,
                "tool raised an error but has no didCatch hook; implement didCatch to handle it"
            ),
            Invocation::Ready(Ok(_)) => {}
            Invocation::Ready(Err(secondary)) => {
                error!(%tool, error = %secondary, "didCatch failed");
            }
            Invocation::Pending(fut) => {
                let handle = self.runtime.spawn(fut);
                self.runtime.spawn(async move {
                    let result = match handle.await {
                        Ok(result) => result.map(drop),
                        Err(join) => Err(HookError::from_join(Lifecycle::DidCatch.as_str(), join)),
                    };
                    if let Err(secondary) = result {
                        error!(%tool, error = %secondary, "didCatch failed");
                    }
                });
            }
        }
    }
}

/// Owns a tool's connection to its store and host.
pub struct LifecycleController<St: Store> {
    core: Arc<Core<St>>,
    bridge: Mutex<Option<StoreBridge>>,
    throttle_window: Duration,
}

impl<St: Store> fmt::Debug for LifecycleController<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("tool", &self.core.tool.name())
            .field("connected", &self.is_connected())
            .field("localized", &self.has_locale())
            .field("tracks_loading", &self.tracks_status())
            .field("throttle_window", &self.throttle_window)
            .finish_non_exhaustive()
    }
}

impl<St: Store> LifecycleController<St> {
    /// Controller on the current Tokio runtime.
    pub fn new(tool: Arc<Tool<St>>, store: Arc<St>) -> Result<Self, ToolError> {
        let runtime = Handle::try_current().map_err(|_| ToolError::NoRuntime)?;
        Ok(Self::with_runtime(tool, store, runtime))
    }

    /// Controller driving pending hooks and timers on `runtime`.
    ///
    /// The tool's context is pointed at `store`.
    pub fn with_runtime(tool: Arc<Tool<St>>, store: Arc<St>, runtime: Handle) -> Self {
        tool.set_context(ToolContext::new(Arc::clone(&store)));
        Self {
            core: Arc::new(Core::new(tool, store, runtime, None, None)),
            bridge: Mutex::new(None),
            throttle_window: DEFAULT_WINDOW,
        }
    }

    /// Enable localization.
    #[must_use]
    pub fn localized(self, localization: Arc<dyn Localization<St>>) -> Self {
        let status = self.core.status.clone();
        self.rebuild(Some(localization), status)
    }

    /// Expose the tool's loading status through its props.
    #[must_use]
    pub fn tracks_loading(self, status: Arc<dyn ToolStatus<St>>) -> Self {
        let localization = self.core.localization.clone();
        self.rebuild(localization, Some(status))
    }

    fn rebuild(
        self,
        localization: Option<Arc<dyn Localization<St>>>,
        status: Option<Arc<dyn ToolStatus<St>>>,
    ) -> Self {
        let core = Core::new(
            Arc::clone(&self.core.tool),
            Arc::clone(&self.core.store),
            self.core.runtime.clone(),
            localization,
            status,
        );
        Self {
            core: Arc::new(core),
            bridge: Mutex::new(None),
            throttle_window: self.throttle_window,
        }
    }

    /// Window of the throttled channel; applies from the next connect.
    #[must_use]
    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Throttled channel window.
    pub fn throttle_window(&self) -> Duration {
        self.throttle_window
    }

    /// Tool namespace.
    pub fn name(&self) -> String {
        self.core.tool.name()
    }

    /// The controlled tool.
    pub fn tool(&self) -> &Arc<Tool<St>> {
        &self.core.tool
    }

    /// The tool's store.
    pub fn store(&self) -> &Arc<St> {
        &self.core.store
    }

    /// Whether localization is enabled.
    pub fn has_locale(&self) -> bool {
        self.core.localization.is_some()
    }

    /// Whether the loading status fields are produced.
    pub fn tracks_status(&self) -> bool {
        self.core.status.is_some()
    }

    /// Whether the tool implements `name`.
    pub fn method_exists(&self, name: impl AsRef<str>) -> bool {
        self.core.gate.exists(name)
    }

    /// Invoke a hook directly, outside the block set.
    ///
    /// A pending hook keeps running on the runtime even if the returned
    /// invocation is dropped.
    pub fn trigger(
        &self,
        name: impl AsRef<str>,
        args: HookArgs<'_, St>,
    ) -> Result<Invocation, InvalidMethodError> {
        let name = name.as_ref();
        let invocation = self.core.gate.invoke(name, args)?;
        Ok(self.core.drive(name, invocation))
    }

    /// Invoke a hook unless an earlier invocation is still in flight.
    pub fn trigger_blocking<F>(
        &self,
        name: impl AsRef<str>,
        args: HookArgs<'_, St>,
        on_settled: F,
    ) -> Result<Trigger, InvalidMethodError>
    where
        F: FnOnce(Option<HookError>) + Send + 'static,
    {
        self.core.invoker.trigger_blocking(name, args, on_settled)
    }

    /// Whether `name` has an invocation in flight.
    pub fn is_blocked(&self, name: impl AsRef<str>) -> bool {
        self.core.invoker.is_blocked(name)
    }

    /// Whether the store channels are attached.
    pub fn is_connected(&self) -> bool {
        self.bridge.lock().as_ref().is_some_and(StoreBridge::is_attached)
    }

    /// Load translations, compute initial props, attach the store channels
    /// and invoke `willConnect`.
    ///
    /// Connecting again first releases the previous channels.
    #[instrument(skip_all, fields(tool = %self.core.tool.name()))]
    pub fn connect(&self, input: Props) -> Result<Invocation, ToolError> {
        let core = &self.core;
        if let Some(localization) = &core.localization {
            let language = input.str(APP_LANGUAGE);
            localization.load(&core.store, language)?;
            *core.last_language.lock() = language.map(str::to_owned);
        }

        let props = core.pipeline.compute(&input)?;
        core.tool.set_props(props);

        {
            let mut bridge = self.bridge.lock();
            if let Some(mut previous) = bridge.take() {
                previous.detach();
            }
            *bridge = Some(self.attach_bridge());
        }
        info!("tool connected");
        Ok(core.invoke_detached(Lifecycle::WillConnect, HookArgs::None))
    }

    /// Release the store channels (if attached) and invoke `willDisconnect`.
    #[instrument(skip_all, fields(tool = %self.core.tool.name()))]
    pub fn disconnect(&self) -> Invocation {
        let bridge = self.bridge.lock().take();
        if let Some(mut bridge) = bridge {
            bridge.detach();
            info!("tool disconnected");
        }
        self.core.invoke_detached(Lifecycle::WillDisconnect, HookArgs::None)
    }

    /// Recompute props from new host input, replace them on the tool and
    /// invoke `willReceiveProps` with the new and previous props.
    ///
    /// Follows `appLanguage` when localization is enabled. Never blocked.
    #[instrument(skip_all, fields(tool = %self.core.tool.name()))]
    pub fn receive_input(&self, input: Props) -> Result<Invocation, ToolError> {
        let core = &self.core;
        if let Some(localization) = &core.localization {
            if let Some(language) = input.str(APP_LANGUAGE) {
                let changed = core.last_language.lock().as_deref() != Some(language);
                if changed {
                    debug!(language, "following host language");
                    localization.set_language(&core.store, language);
                    *core.last_language.lock() = Some(language.to_owned());
                }
            }
        }

        let next = core.pipeline.compute(&input)?;
        let prev = core.tool.set_props(next.clone());
        Ok(core.invoke_detached(
            Lifecycle::WillReceiveProps,
            HookArgs::ReceiveProps {
                next: &next,
                prev: &prev,
            },
        ))
    }

    /// Hand `err` to the tool's `didCatch` hook, or log it when the tool has
    /// none. Failures inside `didCatch` are logged, never returned.
    pub fn report_error(&self, err: &HookError) {
        self.core.report_error(err);
    }

    /// Observe the tool's `tool_did_update` notifications.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.tool.subscribe(listener)
    }

    fn attach_bridge(&self) -> StoreBridge {
        let immediate: Weak<Core<St>> = Arc::downgrade(&self.core);
        let throttled = Weak::clone(&immediate);
        StoreBridge::attach(
            &*self.core.store,
            self.core.runtime.clone(),
            self.throttle_window,
            move || {
                if let Some(core) = immediate.upgrade() {
                    core.handle_store_change(Channel::Immediate);
                }
            },
            move || {
                if let Some(core) = throttled.upgrade() {
                    core.handle_store_change(Channel::Throttled);
                }
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hook::HookOutcome;
    use crate::store::ReducerStore;
    use serde_json::json;

    type TestStore = ReducerStore<i64, i64>;

    fn store() -> Arc<TestStore> {
        Arc::new(ReducerStore::new(0, |s: &i64, a: i64| s + a))
    }

    #[test]
    fn new_requires_a_runtime() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("demo").build();
        assert!(matches!(
            LifecycleController::new(tool, store()),
            Err(ToolError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn controller_sets_tool_context() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("demo").build();
        let store = store();
        let controller = LifecycleController::new(Arc::clone(&tool), Arc::clone(&store)).unwrap();
        assert!(Arc::ptr_eq(&tool.store().unwrap(), &store));
        assert_eq!(controller.throttle_window(), DEFAULT_WINDOW);
        assert!(!controller.has_locale());
    }

    #[tokio::test]
    async fn connect_invokes_will_connect_and_attaches() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("demo")
            .on(Lifecycle::WillConnect, |tool, _| HookOutcome::value(json!(tool.props().len())))
            .build();
        let controller = LifecycleController::new(tool, store()).unwrap();
        let invocation = controller
            .connect(Props::from_json(json!({"a": 1, "b": 2})))
            .unwrap();
        assert!(matches!(
            invocation,
            Invocation::Ready(Ok(crate::hook::HookReturn::Value(v))) if v == json!(2)
        ));
        assert!(controller.is_connected());
        assert!(controller.disconnect().is_absent());
        assert!(!controller.is_connected());
    }
}
