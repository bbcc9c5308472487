//! Timer handles and the per-timer dispatch loop.
//!
//! Callbacks return a boxed future rather than running synchronously: the
//! reactor's original contract came from a world of plain function pointers,
//! but every realistic driver callback here needs to `.await` (a plugin
//! read, a fan-out publish), so the callback type is `Fn() -> BoxFuture`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Whether a timer's callback is serialized against its own next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// The next tick is armed only after the current callback returns.
    Blocking,
    /// Ticks are emitted on a fixed schedule; callbacks may overlap.
    NonBlocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

static NEXT_TIMER_HANDLE: AtomicU64 = AtomicU64::new(1);

pub(crate) struct TimerEntry {
    pub cancelled: Arc<AtomicBool>,
    /// Held by the dispatch loop while a callback runs; `del_timer` acquires
    /// it after setting `cancelled` so it cannot return until any in-flight
    /// callback (in blocking mode) has finished and the loop has observed
    /// cancellation.
    pub gate: Arc<AsyncMutex<()>>,
    pub join: JoinHandle<()>,
}

pub(crate) fn spawn_timer<F, Fut>(interval_ms: u64, mode: TimerMode, callback: F) -> (TimerHandle, TimerEntry)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = TimerHandle(NEXT_TIMER_HANDLE.fetch_add(1, Ordering::Relaxed));
    let cancelled = Arc::new(AtomicBool::new(false));
    let gate = Arc::new(AsyncMutex::new(()));
    let callback: Arc<dyn Fn() -> BoxFuture + Send + Sync> = Arc::new(move || Box::pin(callback()));

    let task_cancelled = Arc::clone(&cancelled);
    let task_gate = Arc::clone(&gate);
    let period = Duration::from_millis(interval_ms.max(1));

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        loop {
            ticker.tick().await;
            if task_cancelled.load(Ordering::Acquire) {
                break;
            }
            match mode {
                TimerMode::Blocking => {
                    let _guard = task_gate.lock().await;
                    if task_cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    invoke(&callback).await;
                }
                TimerMode::NonBlocking => {
                    if task_cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    let cb = Arc::clone(&callback);
                    tokio::spawn(async move { invoke(&cb).await });
                }
            }
        }
    });

    (handle, TimerEntry { cancelled, gate, join })
}

async fn invoke(callback: &Arc<dyn Fn() -> BoxFuture + Send + Sync>) {
    // Worker swallows callback panics so one bad timer can't take the whole
    // reactor down.
    let fut = AssertUnwindSafe(callback()).catch_unwind();
    if fut.await.is_err() {
        tracing::warn!("timer callback panicked; continuing");
    }
}

impl TimerEntry {
    /// Mark cancelled and wait for the dispatch loop to observe it, so the
    /// caller of `del_timer` never races a still-running (blocking-mode)
    /// callback.
    pub async fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.gate.lock().await;
        self.join.abort();
    }
}
