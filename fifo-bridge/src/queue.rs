//! Blocking byte queue connecting the bridge threads.
//!
//! A [`ByteQueue`] is an unbounded byte buffer with reference counts for the
//! threads that may still write ([`Producer`]) and read ([`Consumer`]) it.
//! Handles close their side when dropped, so every exit path of a thread
//! releases its reference exactly once.
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use bytes::{Bytes, BytesMut};

/// Reference count of one side of the queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Refs {
    Open(usize),
    /// Forced closed. Waiters give up immediately.
    Aborted,
}

impl Refs {
    fn is_open(self) -> bool {
        matches!(self, Refs::Open(n) if n > 0)
    }

    fn acquire(&mut self) {
        if let Refs::Open(n) = self {
            *n += 1;
        }
    }

    fn release(&mut self) {
        if let Refs::Open(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

#[derive(Debug)]
struct State {
    buf: BytesMut,
    producers: Refs,
    consumers: Refs,
}

impl State {
    /// Takes `n` bytes if the read can be answered right now.
    /// `None` means the caller has to wait.
    fn take(&mut self, n: usize) -> Option<Option<Bytes>> {
        if self.buf.len() >= n {
            return Some(Some(self.buf.split_to(n).freeze()));
        }
        match self.producers {
            Refs::Aborted => Some(None),
            Refs::Open(0) if self.buf.is_empty() => Some(None),
            // Nothing more will come; hand out what is left.
            Refs::Open(0) => {
                let len = self.buf.len();
                Some(Some(self.buf.split_to(len).freeze()))
            }
            Refs::Open(_) => None,
        }
    }
}

/// Returned by [`Consumer::try_read_exact`] when the read would have to wait.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WouldBlock;

#[derive(Debug)]
pub struct ByteQueue {
    state: Mutex<State>,
    can_produce: Condvar,
    can_consume: Condvar,
}

impl ByteQueue {
    /// Creates an empty queue without producers or consumers.
    ///
    /// Create all handles before starting the threads that use them:
    /// a consumer on a queue without producers sees end-of-stream at once.
    pub fn new() -> Arc<ByteQueue> {
        Arc::new(ByteQueue {
            state: Mutex::new(State {
                buf: BytesMut::new(),
                producers: Refs::Open(0),
                consumers: Refs::Open(0),
            }),
            can_produce: Condvar::new(),
            can_consume: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn producer(self: &Arc<Self>) -> Producer {
        self.lock().producers.acquire();
        Producer {
            queue: Arc::clone(self),
        }
    }

    pub fn consumer(self: &Arc<Self>) -> Consumer {
        self.lock().consumers.acquire();
        Consumer {
            queue: Arc::clone(self),
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the queue for all producers at once and wakes every waiter.
    ///
    /// Blocked reads that cannot be served in full return end-of-stream;
    /// whatever is left in the buffer is not handed out as a short read.
    pub fn abort_producers(&self) {
        self.lock().producers = Refs::Aborted;
        self.can_consume.notify_all();
        self.can_produce.notify_all();
    }

    /// Closes the queue for all consumers at once and wakes every waiter.
    pub fn abort_consumers(&self) {
        self.lock().consumers = Refs::Aborted;
        self.can_consume.notify_all();
        self.can_produce.notify_all();
    }

    pub fn producers_aborted(&self) -> bool {
        self.lock().producers == Refs::Aborted
    }

    fn close_producer(&self) {
        self.lock().producers.release();
        self.can_consume.notify_all();
    }

    fn close_consumer(&self) {
        self.lock().consumers.release();
        self.can_produce.notify_all();
    }
}

/// Write side handle. Dropping it closes one producer reference.
#[derive(Debug)]
pub struct Producer {
    queue: Arc<ByteQueue>,
}

impl Producer {
    /// Appends `data` and wakes blocked readers.
    ///
    /// The write is always accepted. Returns `false` if no consumer is left to
    /// ever read it.
    pub fn write(&self, data: &[u8]) -> bool {
        let mut state = self.queue.lock();
        state.buf.extend_from_slice(data);
        let consumed = state.consumers.is_open();
        drop(state);
        self.queue.can_consume.notify_all();
        consumed
    }

    /// Waits until every buffered byte was read or no consumer remains.
    /// Returns `true` if the buffer is empty.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.queue.lock();
        while !state.buf.is_empty() && state.consumers.is_open() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .queue
                .can_produce
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.buf.is_empty()
    }

    pub fn queue(&self) -> &Arc<ByteQueue> {
        &self.queue
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.queue.close_producer();
    }
}

/// Read side handle. Dropping it closes one consumer reference.
#[derive(Debug)]
pub struct Consumer {
    queue: Arc<ByteQueue>,
}

impl Consumer {
    /// Blocks until `n` bytes are available and removes them.
    ///
    /// Once all producers closed, the last read may return fewer than `n` bytes;
    /// after that, and after an abort, `None` signals end-of-stream.
    pub fn read_exact(&self, n: usize) -> Option<Bytes> {
        let mut state = self.queue.lock();
        loop {
            if let Some(result) = state.take(n) {
                drop(state);
                self.queue.can_produce.notify_all();
                return result;
            }
            state = self
                .queue
                .can_consume
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Consumer::read_exact`], but returns [`WouldBlock`] instead of waiting.
    pub fn try_read_exact(&self, n: usize) -> Result<Option<Bytes>, WouldBlock> {
        let mut state = self.queue.lock();
        let result = state.take(n).ok_or(WouldBlock)?;
        drop(state);
        self.queue.can_produce.notify_all();
        Ok(result)
    }

    pub fn queue(&self) -> &Arc<ByteQueue> {
        &self.queue
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.queue.close_consumer();
    }
}
