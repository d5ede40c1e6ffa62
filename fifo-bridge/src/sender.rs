use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crate::queue::ByteQueue;

/// Owns a sender thread that drains `egress`.
///
/// Dropping the guard force-closes `egress` for its producers, which wakes the
/// sender even in the middle of a blocking read, and then joins it.
pub(crate) struct SenderGuard {
    name: &'static str,
    egress: Arc<ByteQueue>,
    handle: Option<JoinHandle<()>>,
}

impl SenderGuard {
    pub(crate) fn spawn<F>(
        name: &'static str,
        egress: Arc<ByteQueue>,
        body: F,
    ) -> io::Result<SenderGuard>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
        log::debug!("Spawned {}", name);
        Ok(SenderGuard {
            name,
            egress,
            handle: Some(handle),
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SenderGuard {
    fn drop(&mut self) {
        self.egress.abort_producers();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} panicked", self.name);
            } else {
                log::debug!("Joined {}", self.name);
            }
        }
    }
}
