//! Helpers for end-to-end tests that run a bridge on simulated FIFO cores.
use std::{
    io,
    net::{SocketAddr, TcpListener},
    thread::{self, JoinHandle},
    time::Duration,
};

use axis_fifo::{AxisFifo, RxMode, codec::WordCodec, sim::SimFifo};
use bytes::BytesMut;
use fifo_bridge::{BridgeError, BridgeState, Builder, StateHandle, StopFlag};
use tokio::{io::AsyncReadExt, net::TcpStream};
use tokio_util::codec::Decoder;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A bridge running on its own thread.
pub struct RunningBridge {
    pub addr: SocketAddr,
    pub stop: StopFlag,
    pub state: StateHandle,
    handle: JoinHandle<Result<(), BridgeError>>,
}

impl RunningBridge {
    /// Starts a bridge on `127.0.0.1` with short poll intervals.
    pub fn spawn(rx: SimFifo, tx: SimFifo, mode: RxMode) -> io::Result<RunningBridge> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let bridge = Builder::new()
            .mode(mode)
            .read_timeout(Duration::from_millis(10))
            .write_timeout(Duration::from_millis(100))
            .accept_poll_interval(Duration::from_millis(5))
            .build(listener, AxisFifo::new(rx), AxisFifo::new(tx));
        let addr = bridge.local_addr()?;
        let stop = bridge.stop_handle();
        let state = bridge.state();
        let handle = thread::Builder::new()
            .name("bridge".to_string())
            .spawn(move || bridge.run())?;
        Ok(RunningBridge {
            addr,
            stop,
            state,
            handle,
        })
    }

    /// Starts a bridge whose RX and TX sides drive the same core.
    pub fn spawn_shared(sim: &SimFifo, mode: RxMode) -> io::Result<RunningBridge> {
        RunningBridge::spawn(sim.clone(), sim.clone(), mode)
    }

    /// Blocks until the bridge has terminated and returns its result.
    pub fn join(self) -> Result<(), BridgeError> {
        assert!(
            self.state.wait_for(BridgeState::Terminated, TIMEOUT),
            "bridge did not terminate"
        );
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(BridgeError::ThreadPanicked("bridge")),
        }
    }

    /// Async version of [`RunningBridge::join`].
    pub async fn finish(self) -> Result<(), BridgeError> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|_| BridgeError::ThreadPanicked("bridge"))?
    }
}

/// Reads until `count` words have been decoded from `stream`.
///
/// Bytes past the last decoded word stay in `buf`.
pub async fn read_words(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    count: usize,
) -> io::Result<Vec<u32>> {
    let mut words = Vec::with_capacity(count);
    while words.len() < count {
        if let Some(word) = WordCodec.decode(buf)? {
            words.push(word);
            continue;
        }
        let read = tokio::time::timeout(TIMEOUT, stream.read_buf(buf))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        if read == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
    }
    Ok(words)
}

/// Reads until the bridge closes the connection and decodes what is left.
pub async fn read_to_close(stream: &mut TcpStream, buf: &mut BytesMut) -> io::Result<Vec<u32>> {
    loop {
        let read = tokio::time::timeout(TIMEOUT, stream.read_buf(buf))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        if read == 0 {
            break;
        }
    }
    let mut words = Vec::new();
    while let Some(word) = WordCodec.decode_eof(buf)? {
        words.push(word);
    }
    Ok(words)
}
