// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Store port consumed by the controller, plus an in-memory reducer store.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

/// Change listener registered with a store or a tool.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Observable state container owned by a tool.
///
/// The controller only reads state snapshots and dispatches locale and
/// user-mapped actions; everything else belongs to the host.
pub trait Store: Send + Sync + 'static {
    /// Snapshot type returned by [`Store::state`].
    type State: Clone + Send + Sync + 'static;
    /// Action type accepted by [`Store::dispatch`].
    type Action: Send + 'static;

    /// Current state (pure read).
    fn state(&self) -> Self::State;
    /// Apply an action and notify listeners.
    fn dispatch(&self, action: Self::Action);
    /// Observe state changes until the returned subscription is released.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Unsubscribe capability. Released on [`Subscription::unsubscribe`] or drop;
/// releasing twice is a no-op.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap an unsubscribe callback.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Stop observing.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Listener registry shared by [`ReducerStore`] and [`crate::Tool`].
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl ListenerSet {
    pub(crate) fn register(set: &Arc<Mutex<Self>>, listener: Listener) -> Subscription {
        let id = {
            let mut guard = set.lock();
            let id = guard.next_id;
            guard.next_id += 1;
            guard.entries.push((id, listener));
            id
        };
        let weak: Weak<Mutex<Self>> = Arc::downgrade(set);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                set.lock().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Listeners registered right now. Callers invoke them without holding
    /// the lock so listeners may (un)subscribe or dispatch.
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Dispatch handle handed to `mapDispatchToProps`.
pub struct Dispatcher<A> {
    inner: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatcher(..)")
    }
}

impl<A: Send + 'static> Dispatcher<A> {
    /// Wrap a dispatch function.
    pub fn new(dispatch: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(dispatch),
        }
    }

    /// Dispatch into `store`.
    pub fn from_store<St>(store: Arc<St>) -> Self
    where
        St: Store<Action = A>,
    {
        Self::new(move |action| store.dispatch(action))
    }

    /// Dispatch one action.
    pub fn dispatch(&self, action: A) {
        (self.inner)(action);
    }

    /// Wrap an action creator so calling the result dispatches its action.
    pub fn bind<T, F>(&self, creator: F) -> impl Fn(T) + Send + Sync + 'static
    where
        T: 'static,
        F: Fn(T) -> A + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        move |input| inner(creator(input))
    }
}

/// In-memory store driven by a reducer function.
///
/// Listeners run after the new state is committed and outside every lock, in
/// registration order, against the set registered when the dispatch began.
pub struct ReducerStore<S, A> {
    state: RwLock<S>,
    reducer: Box<dyn Fn(&S, A) -> S + Send + Sync>,
    listeners: Arc<Mutex<ListenerSet>>,
}

impl<S, A> ReducerStore<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a store with an initial state.
    pub fn new(initial: S, reducer: impl Fn(&S, A) -> S + Send + Sync + 'static) -> Self {
        Self {
            state: RwLock::new(initial),
            reducer: Box::new(reducer),
            listeners: Arc::new(Mutex::new(ListenerSet::default())),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<S, A> Store for ReducerStore<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;

    fn state(&self) -> S {
        self.state.read().clone()
    }

    fn dispatch(&self, action: A) {
        {
            let mut state = self.state.write();
            let next = (self.reducer)(&*state, action);
            *state = next;
        }
        let listeners = self.listeners.lock().snapshot();
        for listener in listeners {
            listener();
        }
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        ListenerSet::register(&self.listeners, listener)
    }
}

impl<S: fmt::Debug, A> fmt::Debug for ReducerStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerStore")
            .field("state", &*self.state.read())
            .field("listeners", &self.listeners.lock().len())
            .finish_non_exhaustive()
    }
}
