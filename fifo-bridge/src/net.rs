//! Network half of the bridge: the `net-mgr` and `net-tx` threads.
use std::{
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use crate::{
    bridge::Config,
    control::{BridgeState, StateHandle, StopFlag},
    queue::{Consumer, Producer},
    sender::SenderGuard,
};

/// Bytes read from the client per socket read.
const READ_CHUNK: usize = 64;
/// Bytes per word on the wire.
const UNIT: usize = 4;

/// Connected client socket, shut down in both directions when dropped.
struct Client(TcpStream);

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(e) = self.0.shutdown(Shutdown::Both) {
            // Already disconnected is the common case here.
            log::trace!("Client shutdown: {}", e);
        }
        log::debug!("Closed client socket");
    }
}

/// Body of `net-tx`: forwards 4-byte units from `egress` to the client.
fn net_sender(connected: mpsc::Receiver<TcpStream>, egress: Consumer) {
    let Ok(mut tcp) = connected.recv() else {
        log::debug!("net-tx: no client connected");
        return;
    };
    while let Some(unit) = egress.read_exact(UNIT) {
        log::trace!("net-tx: {:02x?}", &unit[..]);
        if let Err(e) = tcp.write_all(&unit) {
            log::error!("Client write error: {}", e);
            break;
        }
    }
    log::debug!("net-tx exiting");
}

fn accept_client(
    listener: &TcpListener,
    stop: &StopFlag,
    poll_interval: Duration,
) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    listener.set_nonblocking(true)?;
    loop {
        if stop.is_requested() {
            return Ok(None);
        }
        match listener.accept() {
            Ok((tcp, addr)) => {
                tcp.set_nonblocking(false)?;
                return Ok(Some((tcp, addr)));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(poll_interval),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Body of `net-mgr`.
///
/// Accepts one client and forwards its bytes into `ingress` until the client
/// disconnects, a socket error occurs, `stop` is requested, or the other half of
/// the bridge is gone. `egress` is handed to the `net-tx` thread.
///
/// Teardown order on every exit path: close `egress` for production and join
/// `net-tx`, close the client socket, then release `ingress`.
pub(crate) fn net_manager(
    listener: TcpListener,
    ingress: Producer,
    egress: Consumer,
    stop: StopFlag,
    state: StateHandle,
    config: Config,
) {
    let mut client: Option<Client> = None;
    let egress_queue = Arc::clone(egress.queue());
    let (connected_tx, connected_rx) = mpsc::channel();
    let sender = match SenderGuard::spawn("net-tx", egress_queue, move || {
        net_sender(connected_rx, egress)
    }) {
        Ok(sender) => sender,
        Err(e) => {
            log::error!("Could not spawn net-tx: {}", e);
            return;
        }
    };
    // Declared after `sender` so it is dropped first: a net-tx still waiting for a
    // client must see the channel close before the guard joins it.
    let connected = connected_tx;

    log::info!("Waiting for a client");
    let (tcp, addr) = match accept_client(&listener, &stop, config.accept_poll_interval) {
        Ok(Some(accepted)) => accepted,
        Ok(None) => {
            log::info!("Stop requested before a client connected");
            return;
        }
        Err(e) => {
            log::error!("Connection error: {}", e);
            return;
        }
    };
    log::info!("New client connection from {}", addr);

    let tcp = client.insert(Client(tcp));
    if let Err(e) = tcp.0.set_nodelay(true) {
        log::debug!("Could not set TCP_NODELAY: {}", e);
    }
    if let Err(e) = tcp.0.set_read_timeout(Some(config.read_timeout)) {
        log::error!("Could not set read timeout: {}", e);
        return;
    }
    match tcp.0.try_clone() {
        Ok(clone) => {
            if let Err(e) = clone.set_write_timeout(Some(config.write_timeout)) {
                log::error!("Could not set write timeout: {}", e);
                return;
            }
            if connected.send(clone).is_err() {
                log::error!("net-tx exited before the client connected");
                return;
            }
        }
        Err(e) => {
            log::error!("Could not clone client socket: {}", e);
            return;
        }
    }
    state.set(BridgeState::Active);

    let mut buf = [0u8; READ_CHUNK];
    loop {
        if stop.is_requested() {
            log::info!("Stop requested, closing connection");
            break;
        }
        if sender.is_finished() {
            log::info!("FIFO to client path closed, closing connection");
            break;
        }
        match tcp.0.read(&mut buf) {
            Ok(0) => {
                log::info!("Client disconnected");
                break;
            }
            Ok(n) => {
                log::trace!("net-mgr: {:02x?}", &buf[..n]);
                if !ingress.write(&buf[..n]) {
                    log::info!("Client to FIFO path closed, closing connection");
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                log::error!("Client read error: {}", e);
                break;
            }
        }
    }
    log::debug!("net-mgr exiting");
}
