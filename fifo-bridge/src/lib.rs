//! # FIFO Bridge Library
//!
//! This crate connects a single TCP client to an AXI4-Stream FIFO core, forwarding
//! the client's byte stream into the core's transmit path and every word arriving on
//! the receive path back to the client, full duplex.
//!
//! ## Architecture
//!
//! A bridge run uses four worker threads, coupled only through two [`queue::ByteQueue`]s
//! wired in a cross:
//!
//! ```text
//! client ──> net-mgr ──> [to_fifo] ──> fifo-tx ──> TX FIFO
//! client <── net-tx  <── [to_client] <── fifo-mgr <── RX FIFO
//! ```
//!
//! - **net-mgr** owns the listening socket, accepts one client and pushes its bytes
//!   into `to_fifo`
//! - **net-tx** writes every 4-byte unit of `to_client` to the client
//! - **fifo-mgr** polls the RX FIFO one word at a time and pushes words into `to_client`
//! - **fifo-tx** sends every 4-byte unit of `to_fifo` to the TX FIFO as one word
//!
//! Each manager spawns and supervises its sender. When a manager exits, for whatever
//! reason, it force-closes the queue its sender reads from, joins the sender and then
//! releases its own producer handle, so the shutdown cascades to the other half.
//!
//! ## Lifecycle
//!
//! [`control::BridgeState`] follows `Connecting -> Active -> Draining -> Terminated`.
//! The FIFO side polls the hardware from the start; words received before a client
//! connects are queued. Once net-mgr ends (client disconnect, socket error, or an
//! external stop), the orchestrator stops fifo-mgr and unblocks fifo-tx.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use std::net::TcpListener;
//! use axis_fifo::{AxisFifo, RxMode};
//! use fifo_bridge::bridge::Builder;
//!
//! let listener = TcpListener::bind("0.0.0.0:5555")?;
//! let bridge = Builder::new()
//!     .mode(RxMode::StoreAndForward)
//!     .build(listener, AxisFifo::new(rx_regs), AxisFifo::new(tx_regs));
//! let stop = bridge.stop_handle();
//! bridge.run()?;
//! ```
//!
//! ## Flow Control
//!
//! The queues are unbounded. The only backpressure is the TX vacancy register:
//! fifo-tx retries a send until the core has room.
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Lifecycle events are logged at `info`, thread
//! transitions at `debug`, and every forwarded unit at `trace`.
pub mod bridge;
pub mod control;
mod hardware;
mod net;
pub mod queue;
mod sender;

pub use bridge::{Bridge, BridgeError, Builder, Config};
pub use control::{BridgeState, StateHandle, StopFlag};
