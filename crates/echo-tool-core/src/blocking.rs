// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-hook mutual exclusion for store-driven invocations.
//!
//! While a hook invocation is in flight (sync body running, or its future not
//! yet settled) further triggers of the same hook are dropped, not queued.
//! Bursts therefore collapse to at most one outstanding call per hook.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::hook::{HookArgs, HookError, Invocation};
use crate::method::{InvalidMethodError, MethodGate, MethodName};
use crate::store::Store;

/// Names of hooks with an invocation in flight.
#[derive(Debug, Default)]
pub struct BlockSet {
    blocked: Mutex<HashSet<MethodName>>,
}

impl BlockSet {
    /// Whether `name` has an invocation in flight.
    pub fn is_blocked(&self, name: &str) -> bool {
        self.blocked.lock().contains(name)
    }

    fn try_block(&self, name: &MethodName) -> bool {
        self.blocked.lock().insert(name.clone())
    }

    fn release(&self, name: &str) {
        self.blocked.lock().remove(name);
    }
}

/// Releases a block exactly once, whichever path settles the invocation.
struct BlockGuard {
    set: Arc<BlockSet>,
    name: MethodName,
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        self.set.release(self.name.as_str());
    }
}

/// How a blocking trigger was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The hook was still in flight; nothing ran.
    Dropped,
    /// The hook ran (or was absent) and settled synchronously.
    Settled,
    /// The hook returned a future; settlement happens on the runtime.
    Pending,
}

/// Invokes hooks through a [`MethodGate`] with per-hook exclusion.
pub struct BlockingInvoker<St: Store> {
    gate: MethodGate<St>,
    blocked: Arc<BlockSet>,
    runtime: Handle,
}

impl<St: Store> fmt::Debug for BlockingInvoker<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingInvoker")
            .field("gate", &self.gate)
            .field("blocked", &self.blocked)
            .finish_non_exhaustive()
    }
}

impl<St: Store> BlockingInvoker<St> {
    /// Wrap `gate`; pending hooks are driven on `runtime`.
    pub fn new(gate: MethodGate<St>, runtime: Handle) -> Self {
        Self {
            gate,
            blocked: Arc::new(BlockSet::default()),
            runtime,
        }
    }

    /// Whether `name` has an invocation in flight.
    pub fn is_blocked(&self, name: impl AsRef<str>) -> bool {
        self.blocked.is_blocked(name.as_ref())
    }

    /// Invoke `name` unless an earlier invocation is still in flight.
    ///
    /// `on_settled` runs once the invocation has fully settled and the block
    /// is released, with the hook's error if it failed. For synchronous hooks
    /// (and absent ones) it runs before this call returns; for pending hooks
    /// it runs on the runtime. A dropped trigger never calls it.
    pub fn trigger_blocking<F>(
        &self,
        name: impl AsRef<str>,
        args: HookArgs<'_, St>,
        on_settled: F,
    ) -> Result<Trigger, InvalidMethodError>
    where
        F: FnOnce(Option<HookError>) + Send + 'static,
    {
        let name = MethodName::new(name.as_ref())?;
        if !self.blocked.try_block(&name) {
            trace!(hook = %name, "hook still in flight; trigger dropped");
            return Ok(Trigger::Dropped);
        }
        let guard = BlockGuard {
            set: Arc::clone(&self.blocked),
            name,
        };

        match self.gate.invoke(&guard.name, args)? {
            Invocation::Absent | Invocation::Ready(Ok(_)) => {
                drop(guard);
                on_settled(None);
                Ok(Trigger::Settled)
            }
            Invocation::Ready(Err(err)) => {
                drop(guard);
                on_settled(Some(err));
                Ok(Trigger::Settled)
            }
            Invocation::Pending(fut) => {
                debug!(hook = %guard.name, "hook pending; blocking re-entry");
                let runtime = self.runtime.clone();
                self.runtime.spawn(async move {
                    // The hook body runs in its own task so a panic is
                    // reported as a JoinError instead of killing this one.
                    let result = match runtime.spawn(fut).await {
                        Ok(result) => result.map(drop),
                        Err(join) => Err(HookError::from_join(guard.name.as_str(), join)),
                    };
                    drop(guard);
                    on_settled(result.err());
                });
                Ok(Trigger::Pending)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::hook::{HookOutcome, HookReturn};
    use crate::method::Lifecycle;
    use crate::store::ReducerStore;
    use crate::tool::Tool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Notify};

    type TestStore = ReducerStore<i64, i64>;

    fn settle_into(tx: &mpsc::UnboundedSender<Option<String>>) -> impl FnOnce(Option<HookError>) + Send + 'static {
        let tx = tx.clone();
        move |err| {
            let _ = tx.send(err.map(|e| e.to_string()));
        }
    }

    fn pending_tool(calls: &Arc<AtomicUsize>, release: &Arc<Notify>, fail: bool) -> Arc<Tool<TestStore>> {
        let calls = Arc::clone(calls);
        let release = Arc::clone(release);
        Tool::<TestStore>::builder("pending")
            .on(Lifecycle::StateChanged, move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                let release = Arc::clone(&release);
                HookOutcome::pending(async move {
                    release.notified().await;
                    if fail {
                        Err(HookError::msg("rejected"))
                    } else {
                        Ok(HookReturn::Nothing)
                    }
                })
            })
            .build()
    }

    #[tokio::test]
    async fn pending_hook_blocks_until_settled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let invoker = BlockingInvoker::new(
            MethodGate::new(pending_tool(&calls, &release, false)),
            Handle::current(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = invoker.trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx));
        let second = invoker.trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx));
        assert_eq!(first.unwrap(), Trigger::Pending);
        assert_eq!(second.unwrap(), Trigger::Dropped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(invoker.is_blocked(Lifecycle::StateChanged));

        release.notify_one();
        assert_eq!(rx.recv().await, Some(None));
        assert!(!invoker.is_blocked(Lifecycle::StateChanged));

        let third = invoker.trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx));
        assert_eq!(third.unwrap(), Trigger::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        release.notify_one();
        assert_eq!(rx.recv().await, Some(None));
    }

    #[tokio::test]
    async fn rejected_future_unblocks_and_reports() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let invoker = BlockingInvoker::new(
            MethodGate::new(pending_tool(&calls, &release, true)),
            Handle::current(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        invoker
            .trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx))
            .unwrap();
        release.notify_one();
        assert_eq!(rx.recv().await, Some(Some("rejected".to_owned())));
        assert!(!invoker.is_blocked(Lifecycle::StateChanged));
    }

    async fn explode() -> Result<HookReturn, HookError> {
        panic!("async boom")
    }

    #[tokio::test]
    async fn panicking_future_unblocks_and_reports() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("panicky")
            .on(Lifecycle::StateChanged, |_, _| HookOutcome::pending(explode()))
            .build();
        let invoker = BlockingInvoker::new(MethodGate::new(tool), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        invoker
            .trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx))
            .unwrap();
        let reported = rx.recv().await.unwrap().unwrap();
        assert!(reported.contains("async boom"));
        assert!(!invoker.is_blocked(Lifecycle::StateChanged));
    }

    #[tokio::test]
    async fn sync_hooks_never_carry_a_block() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("sync")
            .on(Lifecycle::StateChanged, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                HookOutcome::value(1)
            })
            .build();
        let invoker = BlockingInvoker::new(MethodGate::new(tool), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..2 {
            let trigger = invoker.trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx));
            assert_eq!(trigger.unwrap(), Trigger::Settled);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_recv().unwrap(), None);
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn sync_failure_settles_with_error() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("failing")
            .on(Lifecycle::StateChanged, |_, _| HookOutcome::fail(HookError::msg("nope")))
            .build();
        let invoker = BlockingInvoker::new(MethodGate::new(tool), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        invoker
            .trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Some("nope".to_owned()));
        assert!(!invoker.is_blocked(Lifecycle::StateChanged));
    }

    #[tokio::test]
    async fn absent_hook_settles_immediately() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("empty").build();
        let invoker = BlockingInvoker::new(MethodGate::new(tool), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let trigger = invoker.trigger_blocking(Lifecycle::StateChanged, HookArgs::None, settle_into(&tx));
        assert_eq!(trigger.unwrap(), Trigger::Settled);
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn private_names_are_usage_errors() {
        let tool: Arc<Tool<TestStore>> = Tool::<TestStore>::builder("empty").build();
        let invoker = BlockingInvoker::new(MethodGate::new(tool), Handle::current());
        let result = invoker.trigger_blocking("_secret", HookArgs::None, |_| {});
        assert!(result.is_err());
        assert!(!invoker.is_blocked("_secret"));
    }
}
