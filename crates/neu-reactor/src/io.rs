//! I/O readiness handles: fires on readable, hang-up, or peer-closed.

use std::os::unix::io::RawFd;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::unix::AsyncFd;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoHandle(u64);

static NEXT_IO_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    Readable,
    HangUp,
    PeerClosed,
}

pub(crate) struct IoEntry {
    pub join: JoinHandle<()>,
}

/// Wrap a raw fd and watch it for read readiness on the current Tokio
/// runtime. `fd` must not be owned/closed elsewhere while registered.
pub(crate) fn spawn_io<F>(fd: RawFd, callback: F) -> std::io::Result<(IoHandle, IoEntry)>
where
    F: Fn(IoEvent) + Send + Sync + 'static,
{
    let handle = IoHandle(NEXT_IO_HANDLE.fetch_add(1, Ordering::Relaxed));
    let async_fd = AsyncFd::new(fd)?;
    let callback = Arc::new(callback);

    let join = tokio::spawn(async move {
        loop {
            let mut guard = match async_fd.readable().await {
                Ok(guard) => guard,
                Err(_) => break,
            };
            let ready = guard.ready();
            let event = if ready.is_read_closed() {
                IoEvent::PeerClosed
            } else if ready.is_write_closed() {
                IoEvent::HangUp
            } else {
                IoEvent::Readable
            };
            invoke(&callback, event);
            guard.clear_ready();
        }
    });

    Ok((handle, IoEntry { join }))
}

fn invoke(callback: &Arc<dyn Fn(IoEvent) + Send + Sync>, event: IoEvent) {
    if std::panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
        tracing::warn!("io callback panicked; continuing");
    }
}

impl IoEntry {
    pub fn cancel(self) {
        self.join.abort();
    }
}
