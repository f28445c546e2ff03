// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trailing-edge rate limiter.
//!
//! The first call opens a window; calls inside the window are absorbed; the
//! action runs once when the window closes. There is no leading call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Window used for the throttled state channel.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Collapses bursts of calls into one trailing call per window.
pub struct Throttle {
    window: Duration,
    runtime: Handle,
    action: Arc<dyn Fn() + Send + Sync>,
    armed: Arc<AtomicBool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Throttle {
    /// Throttle `action` to one trailing run per `window`, timed on `runtime`.
    pub fn new(window: Duration, runtime: Handle, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            window,
            runtime,
            action: Arc::new(action),
            armed: Arc::new(AtomicBool::new(false)),
            timer: Mutex::new(None),
        }
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a trailing run is scheduled.
    pub fn is_pending(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Register a call; opens a window if none is open.
    pub fn call(&self) {
        if self.armed.swap(true, Ordering::SeqCst) {
            return;
        }
        let action = Arc::clone(&self.action);
        let armed = Arc::clone(&self.armed);
        let window = self.window;
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            // Disarm before running so calls made by the action open a new window.
            armed.store(false, Ordering::SeqCst);
            action();
        });
        *self.timer.lock() = Some(timer);
    }

    /// Drop any scheduled run.
    pub fn cancel(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}
