//! Public reactor handle: `new`, `add_timer`/`del_timer`, `add_io`/`del_io`, `close`.

use std::collections::HashMap;
use std::future::Future;
use std::os::unix::io::RawFd;
use std::sync::Mutex;

use neu_core::error::{ErrorCode, NeuError, Result};

use crate::io::{spawn_io, IoEntry, IoEvent, IoHandle};
use crate::timer::{spawn_timer, TimerEntry, TimerHandle, TimerMode};

/// One reactor owns its own set of timer/io tasks; there is no process-wide
/// singleton (see `neu_core::context::SystemContext` for why).
pub struct Reactor {
    timers: Mutex<HashMap<TimerHandle, TimerEntry>>,
    ios: Mutex<HashMap<IoHandle, IoEntry>>,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            ios: Mutex::new(HashMap::new()),
        }
    }

    /// Arm a periodic timer with a plain synchronous callback. Fails with
    /// `EInternal` only if the runtime itself cannot schedule the task
    /// (practically infallible under Tokio, kept `Result` to match the
    /// OS-error contract).
    pub fn add_timer<F>(&self, interval_ms: u64, mode: TimerMode, callback: F) -> Result<TimerHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_timer_async(interval_ms, mode, move || std::future::ready(callback()))
    }

    /// Arm a periodic timer whose callback is itself async — the realization
    /// the driver scheduler needs, since a group tick awaits the plugin's
    /// `group_timer` and the fan-out publish before the tick is considered
    /// complete (blocking mode must not re-arm until that finishes).
    pub fn add_timer_async<F, Fut>(&self, interval_ms: u64, mode: TimerMode, callback: F) -> Result<TimerHandle>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (handle, entry) = spawn_timer(interval_ms, mode, callback);
        self.timers
            .lock()
            .expect("reactor timers poisoned")
            .insert(handle, entry);
        Ok(handle)
    }

    /// Synchronous under cancellation: once this returns, the timer's
    /// callback will never run again.
    pub async fn del_timer(&self, handle: TimerHandle) -> Result<()> {
        let entry = self
            .timers
            .lock()
            .expect("reactor timers poisoned")
            .remove(&handle);
        match entry {
            Some(entry) => {
                entry.cancel().await;
                Ok(())
            }
            None => Err(NeuError::domain(ErrorCode::ENoEnt, "no such timer handle")),
        }
    }

    pub fn add_io<F>(&self, fd: RawFd, callback: F) -> Result<IoHandle>
    where
        F: Fn(IoEvent) + Send + Sync + 'static,
    {
        let (handle, entry) =
            spawn_io(fd, callback).map_err(|e| NeuError::domain(ErrorCode::EInternal, e.to_string()))?;
        self.ios.lock().expect("reactor ios poisoned").insert(handle, entry);
        Ok(handle)
    }

    pub fn del_io(&self, handle: IoHandle) -> Result<()> {
        let entry = self.ios.lock().expect("reactor ios poisoned").remove(&handle);
        match entry {
            Some(entry) => {
                entry.cancel();
                Ok(())
            }
            None => Err(NeuError::domain(ErrorCode::ENoEnt, "no such io handle")),
        }
    }

    /// Stop every owned timer/io task. Does not await straggler callbacks
    /// beyond the per-timer cancellation guarantee already provided by
    /// `del_timer`'s gate.
    pub async fn close(&self) {
        let timers: Vec<_> = self.timers.lock().expect("reactor timers poisoned").drain().collect();
        for (_, entry) in timers {
            entry.cancel().await;
        }
        let ios: Vec<_> = self.ios.lock().expect("reactor ios poisoned").drain().collect();
        for (_, entry) in ios {
            entry.cancel();
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn blocking_timer_fires_roughly_on_schedule() {
        let reactor = Reactor::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let handle = reactor
            .add_timer(20, TimerMode::Blocking, move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(110)).await;
        reactor.del_timer(handle).await.unwrap();
        let fired = count.load(Ordering::SeqCst);
        assert!((3..=7).contains(&fired), "fired {fired} times");
    }

    #[tokio::test]
    async fn del_timer_guarantees_no_further_dispatch() {
        let reactor = Reactor::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let handle = reactor
            .add_timer(10, TimerMode::Blocking, move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        reactor.del_timer(handle).await.unwrap();
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn del_timer_on_unknown_handle_fails() {
        let reactor = Reactor::new();
        let handle = reactor.add_timer(50, TimerMode::Blocking, || {}).unwrap();
        reactor.del_timer(handle).await.unwrap();
        let err = reactor.del_timer(handle).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ENoEnt);
    }
}
