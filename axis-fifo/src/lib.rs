//! # AXI4-Stream FIFO Driver
//!
//! Register-level access to the AMD/Xilinx AXI4-Stream FIFO core from userspace,
//! typically through a memory-mapped register window.
//!
//! ## Overview
//!
//! The core exposes a small block of 32-bit registers: a transmit data FIFO with a
//! length register that delimits packets, a receive data FIFO with a length register
//! describing the next packet, and an interrupt status register with write-1-to-clear
//! semantics. This crate wraps that register block with:
//!
//! - Reset handshakes for the TX side, the RX side and the whole core
//! - Vacancy-checked sends of byte buffers or pre-packed words
//! - A streaming read protocol that works in both store-and-forward and
//!   cut-through mode
//! - Error interrupt checking and a small error code taxonomy
//!
//! ## Register Access
//!
//! The driver never touches memory directly. All accesses go through the
//! [`Registers`] trait, so the same driver runs on a real mapping or on the
//! software model in [`sim`] (feature `sim`).
//!
//! ## Basic Usage
//!
//! ```ignore
//! use axis_fifo::{AxisFifo, ReadState, RxMode};
//!
//! let fifo = AxisFifo::new(my_register_block);
//! if let Err(e) = fifo.reset_all() {
//!     log::warn!("{}", e);
//! }
//!
//! fifo.send_words(&[0xDEAD_BEEF])?;
//!
//! let mut state = ReadState::new();
//! let mut buf = [0u32; 16];
//! let outcome = fifo.read(RxMode::StoreAndForward, &mut buf, &mut state)?;
//! if state.is_idle() {
//!     // the packet is complete
//! }
//! ```
//!
//! ## Error Codes
//!
//! ```
//! use axis_fifo::error::{error_string, ERR_IRQ};
//!
//! assert_eq!(error_string(-ERR_IRQ), "error interrupt raised by the FIFO core");
//! ```
//!
//! ## Thread Safety
//!
//! The register block has no locking. Each block must be driven by one thread at a
//! time, and each RX FIFO needs its own [`ReadState`].

pub mod error;
pub mod registers;
pub use registers::{Interrupts, Register, Registers};
mod fifo;
pub use fifo::AxisFifo;
mod read;
pub use read::{ReadOutcome, ReadPhase, ReadState, RxMode};
#[cfg(feature = "tokio")]
pub mod codec;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
