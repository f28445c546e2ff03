// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Turns raw store notifications into an immediate and a throttled channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::store::{Store, Subscription};
use crate::throttle::Throttle;

/// The two store subscriptions of one connected tool.
///
/// Detaching is synchronous: the throttle timer is cancelled, both
/// subscriptions are released, and a notification already on its way to a
/// listener is ignored.
pub struct StoreBridge {
    immediate: Subscription,
    throttled: Subscription,
    throttle: Arc<Throttle>,
    active: Arc<AtomicBool>,
}

impl StoreBridge {
    /// Subscribe to `store`.
    ///
    /// `on_change` runs on every notification. `on_change_throttled` runs once
    /// per `window` on the trailing edge of a burst.
    pub fn attach<St, F, G>(
        store: &St,
        runtime: Handle,
        window: Duration,
        on_change: F,
        on_change_throttled: G,
    ) -> Self
    where
        St: Store,
        F: Fn() + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));

        let throttle = {
            let active = Arc::clone(&active);
            Arc::new(Throttle::new(window, runtime, move || {
                if active.load(Ordering::SeqCst) {
                    on_change_throttled();
                }
            }))
        };

        let immediate = {
            let active = Arc::clone(&active);
            store.subscribe(Arc::new(move || {
                if active.load(Ordering::SeqCst) {
                    on_change();
                }
            }))
        };

        let throttled = {
            let active = Arc::clone(&active);
            let throttle = Arc::clone(&throttle);
            store.subscribe(Arc::new(move || {
                if active.load(Ordering::SeqCst) {
                    throttle.call();
                }
            }))
        };

        debug!(window_ms = window.as_millis(), "store bridge attached");
        Self {
            immediate,
            throttled,
            throttle,
            active,
        }
    }

    /// Whether both channels are still live.
    pub fn is_attached(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop both channels. Idempotent.
    pub fn detach(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("store bridge detached");
        }
        self.throttle.cancel();
        self.immediate.unsubscribe();
        self.throttled.unsubscribe();
    }
}

impl Drop for StoreBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for StoreBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBridge")
            .field("attached", &self.is_attached())
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
