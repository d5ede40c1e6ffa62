use std::{
    fmt::Display,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// Cooperative stop request shared between threads.
#[derive(Clone, Debug, Default)]
pub struct StopFlag {
    requested: Arc<Mutex<bool>>,
}

impl StopFlag {
    pub fn new() -> StopFlag {
        StopFlag::default()
    }

    pub fn request(&self) {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lifecycle of one bridge run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum BridgeState {
    /// Waiting for a client. The FIFO side is already polling the hardware.
    #[default]
    Connecting,
    /// A client is connected and both directions are flowing.
    Active,
    /// The network side has finished; the FIFO side is shutting down.
    Draining,
    /// All threads have been joined.
    Terminated,
}

impl Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BridgeState::Connecting => "connecting",
            BridgeState::Active => "active",
            BridgeState::Draining => "draining",
            BridgeState::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Default)]
struct StateCell {
    state: Mutex<BridgeState>,
    changed: Condvar,
}

/// Observable [`BridgeState`] of a running bridge.
#[derive(Clone, Debug, Default)]
pub struct StateHandle {
    cell: Arc<StateCell>,
}

impl StateHandle {
    pub fn new() -> StateHandle {
        StateHandle::default()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.cell.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> BridgeState {
        *self.lock()
    }

    pub(crate) fn set(&self, state: BridgeState) {
        let mut current = self.lock();
        if *current != state {
            log::debug!("Bridge state {} -> {}", *current, state);
            *current = state;
        }
        drop(current);
        self.cell.changed.notify_all();
    }

    /// Blocks until the bridge has reached `state` (or a later one).
    /// Returns `false` on timeout.
    pub fn wait_for(&self, state: BridgeState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.lock();
        while *current < state {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            current = self
                .cell
                .changed
                .wait_timeout(current, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn stop_flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_requested());
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn wait_for_later_state() {
        let handle = StateHandle::new();
        assert_eq!(handle.get(), BridgeState::Connecting);
        assert!(!handle.wait_for(BridgeState::Active, Duration::from_millis(10)));

        let setter = handle.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set(BridgeState::Terminated);
        });
        assert!(handle.wait_for(BridgeState::Draining, Duration::from_secs(5)));
        worker.join().unwrap();
        assert_eq!(handle.get().to_string(), "terminated");
    }
}
