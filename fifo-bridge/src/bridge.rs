use std::{
    error::Error,
    fmt::Display,
    io,
    net::{SocketAddr, TcpListener},
    thread,
    time::Duration,
};

use axis_fifo::{AxisFifo, Registers, RxMode};

use crate::{
    control::{BridgeState, StateHandle, StopFlag},
    hardware::fifo_manager,
    net::net_manager,
    queue::ByteQueue,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// How the RX FIFO presents packets.
    pub mode: RxMode,
    /// Socket read timeout. Bounds how long a stop request can go unnoticed
    /// while a client is connected.
    pub read_timeout: Duration,
    /// Socket write timeout. A client that stops reading cannot hold up
    /// teardown for longer than this.
    pub write_timeout: Duration,
    /// Interval between accept attempts while waiting for a client.
    pub accept_poll_interval: Duration,
    /// Issue a full core reset on both FIFOs before starting.
    pub reset_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RxMode::StoreAndForward,
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(1),
            accept_poll_interval: Duration::from_millis(50),
            reset_on_start: true,
        }
    }
}

/// Builder to create a [Bridge] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use fifo_bridge::bridge::Builder;
/// use axis_fifo::RxMode;
///
/// let bridge = Builder::new()
///     .mode(RxMode::CutThrough)
///     .read_timeout(Duration::from_millis(20))
///     .build(listener, rx_fifo, tx_fifo);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set how the RX FIFO was configured in hardware.
    pub fn mode(mut self, mode: RxMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the client socket read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the client socket write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set how often to check for a client while waiting for one
    pub fn accept_poll_interval(mut self, interval: Duration) -> Self {
        self.config.accept_poll_interval = interval;
        self
    }

    /// Whether to reset both FIFO cores before starting
    pub fn reset_on_start(mut self, reset: bool) -> Self {
        self.config.reset_on_start = reset;
        self
    }

    /// Build and return the bridge
    pub fn build<R: Registers + 'static, T: Registers + 'static>(
        self,
        listener: TcpListener,
        rx: AxisFifo<R>,
        tx: AxisFifo<T>,
    ) -> Bridge<R, T> {
        Bridge::new(listener, rx, tx, self.config)
    }
}

/// Errors that end a bridge run.
#[derive(Debug)]
pub enum BridgeError {
    IoError(io::Error),
    ThreadPanicked(&'static str),
}

impl From<io::Error> for BridgeError {
    fn from(value: io::Error) -> Self {
        BridgeError::IoError(value)
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::IoError(error) => write!(f, "{}", error),
            BridgeError::ThreadPanicked(name) => write!(f, "Thread {} panicked", name),
        }
    }
}

impl Error for BridgeError {}

/// Bridges one TCP client and a pair of FIFO cores.
///
/// `rx` and `tx` may drive the same core (one register block shared by both
/// threads) or two separate cores.
#[derive(Debug)]
pub struct Bridge<R: Registers, T: Registers> {
    listener: TcpListener,
    rx: AxisFifo<R>,
    tx: AxisFifo<T>,
    config: Config,
    stop: StopFlag,
    state: StateHandle,
}

impl<R, T> Bridge<R, T>
where
    R: Registers + 'static,
    T: Registers + 'static,
{
    pub fn new(listener: TcpListener, rx: AxisFifo<R>, tx: AxisFifo<T>, config: Config) -> Self {
        Bridge {
            listener,
            rx,
            tx,
            config,
            stop: StopFlag::new(),
            state: StateHandle::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Flag that ends the run from outside, e.g. on a signal.
    pub fn stop_handle(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Serves one client, then tears everything down.
    ///
    /// Returns once the client disconnected, a socket or hardware error ended
    /// one of the halves, or a stop was requested. The FIFO register blocks and
    /// the listening socket are released before this returns.
    pub fn run(self) -> Result<(), BridgeError> {
        let Bridge {
            listener,
            rx,
            tx,
            config,
            stop,
            state,
        } = self;

        if config.reset_on_start {
            if let Err(e) = rx.reset_all() {
                log::warn!("RX FIFO might not have reset correctly: {}", e);
            }
            if let Err(e) = tx.reset_all() {
                log::warn!("TX FIFO might not have reset correctly: {}", e);
            }
        }
        state.set(BridgeState::Connecting);

        let to_client = ByteQueue::new();
        let to_fifo = ByteQueue::new();
        // Every handle exists before any thread starts, so no reader can observe
        // a queue that has no producers yet.
        let fifo_ingress = to_client.producer();
        let fifo_egress = to_fifo.consumer();
        let net_ingress = to_fifo.producer();
        let net_egress = to_client.consumer();

        let fifo_stop = StopFlag::new();
        let mode = config.mode;
        let fifo_mgr = thread::Builder::new().name("fifo-mgr".to_string()).spawn({
            let fifo_stop = fifo_stop.clone();
            move || fifo_manager(rx, tx, mode, fifo_ingress, fifo_egress, fifo_stop)
        })?;

        let net_mgr = thread::Builder::new().name("net-mgr".to_string()).spawn({
            let state = state.clone();
            move || net_manager(listener, net_ingress, net_egress, stop, state, config)
        });
        let net_mgr = match net_mgr {
            Ok(handle) => handle,
            Err(e) => {
                fifo_stop.request();
                to_fifo.abort_producers();
                let _ = fifo_mgr.join();
                state.set(BridgeState::Terminated);
                return Err(e.into());
            }
        };

        let net_result = net_mgr.join();
        state.set(BridgeState::Draining);
        log::info!("Network side finished, stopping FIFO side");
        fifo_stop.request();
        // fifo-tx may be blocked waiting for client data that will never come.
        to_fifo.abort_producers();
        let fifo_result = fifo_mgr.join();
        state.set(BridgeState::Terminated);
        log::info!("Bridge terminated");

        net_result.map_err(|_| BridgeError::ThreadPanicked("net-mgr"))?;
        fifo_result.map_err(|_| BridgeError::ThreadPanicked("fifo-mgr"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axis_fifo::{Interrupts, sim::SimFifo};
    use fifo_bridge_client::BridgeClient;
    use std::{io::ErrorKind, thread::JoinHandle, time::Instant};

    const TIMEOUT: Duration = Duration::from_secs(5);

    type Started = (
        SocketAddr,
        StopFlag,
        StateHandle,
        JoinHandle<Result<(), BridgeError>>,
    );

    fn start(sim: &SimFifo, reset_on_start: bool) -> Started {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let bridge = Builder::new()
            .reset_on_start(reset_on_start)
            .read_timeout(Duration::from_millis(10))
            .accept_poll_interval(Duration::from_millis(5))
            .build(
                listener,
                AxisFifo::new(sim.clone()),
                AxisFifo::new(sim.clone()),
            );
        let addr = bridge.local_addr().unwrap();
        let stop = bridge.stop_handle();
        let state = bridge.state();
        (addr, stop, state, thread::spawn(move || bridge.run()))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn words_are_echoed_through_loopback() {
        let sim = SimFifo::new();
        sim.set_loopback(true);
        let (addr, _stop, state, bridge) = start(&sim, true);

        let mut client = BridgeClient::connect(addr).unwrap();
        client.set_read_timeout(Some(TIMEOUT)).unwrap();
        let words = [0x0000_0001, 0xDEAD_BEEF, 0x1234_5678, 0xFFFF_FFFF];
        client.send_words(&words).unwrap();
        assert_eq!(client.recv_words(words.len()).unwrap(), words.to_vec());
        assert_eq!(state.get(), BridgeState::Active);

        client.shutdown().unwrap();
        bridge.join().unwrap().unwrap();
        assert_eq!(state.get(), BridgeState::Terminated);
    }

    #[test]
    fn words_received_before_connect_are_delivered() {
        let sim = SimFifo::new();
        sim.push_rx_packet(&[7, 8]);
        let (addr, stop, state, bridge) = start(&sim, false);
        // The FIFO side polls while nobody is connected.
        wait_until(|| sim.rx_backlog() == 0);
        assert_eq!(state.get(), BridgeState::Connecting);

        let mut client = BridgeClient::connect(addr).unwrap();
        client.set_read_timeout(Some(TIMEOUT)).unwrap();
        assert_eq!(client.recv_words(2).unwrap(), vec![7, 8]);

        stop.request();
        bridge.join().unwrap().unwrap();
    }

    #[test]
    fn client_bytes_reach_the_tx_fifo() {
        let sim = SimFifo::new();
        let (addr, _stop, state, bridge) = start(&sim, true);
        let mut client = BridgeClient::connect(addr).unwrap();
        client.send_bytes(&0xCAFE_0001u32.to_ne_bytes()[..3]).unwrap();
        client.send_bytes(&0xCAFE_0001u32.to_ne_bytes()[3..]).unwrap();
        client.send_words(&[0xCAFE_0002]).unwrap();
        wait_until(|| sim.tx_packets().len() == 2);
        let sent: Vec<u32> = sim.tx_packets().iter().flat_map(|p| p.words.clone()).collect();
        assert_eq!(sent, vec![0xCAFE_0001, 0xCAFE_0002]);

        drop(client);
        assert!(state.wait_for(BridgeState::Terminated, TIMEOUT));
        bridge.join().unwrap().unwrap();
    }

    #[test]
    fn disconnect_stops_fifo_side_within_bounded_time() {
        let sim = SimFifo::new();
        let (addr, _stop, state, bridge) = start(&sim, true);
        let client = BridgeClient::connect(addr).unwrap();
        assert!(state.wait_for(BridgeState::Active, TIMEOUT));
        // fifo-tx is now blocked on an empty queue.
        drop(client);
        assert!(state.wait_for(BridgeState::Terminated, TIMEOUT));
        bridge.join().unwrap().unwrap();
    }

    #[test]
    fn stop_before_any_client() {
        let sim = SimFifo::new();
        let (_addr, stop, state, bridge) = start(&sim, true);
        stop.request();
        bridge.join().unwrap().unwrap();
        assert_eq!(state.get(), BridgeState::Terminated);
    }

    #[test]
    fn rx_error_closes_the_connection() {
        let sim = SimFifo::new();
        let (addr, _stop, state, bridge) = start(&sim, true);
        let mut client = BridgeClient::connect(addr).unwrap();
        client.set_read_timeout(Some(TIMEOUT)).unwrap();
        assert!(state.wait_for(BridgeState::Active, TIMEOUT));

        // Data without a packet length makes the RLR read underrun.
        sim.push_rx_words(&[1]);
        let err = client.recv_word().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        assert!(state.wait_for(BridgeState::Terminated, TIMEOUT));
        bridge.join().unwrap().unwrap();
        assert!(!sim.interrupts().intersects(Interrupts::RX_ERRORS));
    }

    #[test]
    fn failed_reset_is_not_fatal() {
        let sim = SimFifo::new();
        sim.set_reset_echo(false);
        sim.set_loopback(true);
        let (addr, _stop, _state, bridge) = start(&sim, true);
        let mut client = BridgeClient::connect(addr).unwrap();
        client.set_read_timeout(Some(TIMEOUT)).unwrap();
        client.send_words(&[42]).unwrap();
        assert_eq!(client.recv_word().unwrap(), 42);
        drop(client);
        bridge.join().unwrap().unwrap();
    }
}
