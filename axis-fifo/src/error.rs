use std::{error::Error, fmt::Display};

use crate::registers::Interrupts;

pub const SUCCESS: i32 = 0;
pub const TX_FIFO_NO_ROOM: i32 = 1;
pub const RX_FIFO_EMPTY: i32 = 2;
pub const ERR_IRQ: i32 = 3;
pub const NULL_ARG: i32 = 4;

const ERROR_STRINGS: [&str; 5] = [
    "success",
    "not enough vacancy in TX FIFO",
    "RX FIFO is empty",
    "error interrupt raised by the FIFO core",
    "missing or empty argument",
];

/// Returns the human readable text of an error code.
/// Both the code and its negation (as returned by the driver) are accepted.
pub fn error_string(code: i32) -> &'static str {
    ERROR_STRINGS
        .get(code.unsigned_abs() as usize)
        .copied()
        .unwrap_or("unknown error code")
}

/// Errors reported by the FIFO driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FifoError {
    /// The TX vacancy register reported less room than the transfer needs.
    TxFifoNoRoom { needed: usize, vacancy: u32 },
    /// Nothing was buffered in the RX FIFO.
    RxFifoEmpty,
    /// The core raised an error interrupt.
    ///
    /// `words` is the number of words that were transferred before the error was seen.
    /// For reads these words are already in the destination buffer; whether they are
    /// usable is up to the caller.
    ErrIrq { flags: Interrupts, words: usize },
    /// An argument was empty where data was required.
    NullArg,
}

impl FifoError {
    /// The positive error code of this error.
    pub fn code(&self) -> i32 {
        match self {
            FifoError::TxFifoNoRoom { .. } => TX_FIFO_NO_ROOM,
            FifoError::RxFifoEmpty => RX_FIFO_EMPTY,
            FifoError::ErrIrq { .. } => ERR_IRQ,
            FifoError::NullArg => NULL_ARG,
        }
    }
}

impl Display for FifoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FifoError::TxFifoNoRoom { needed, vacancy } => write!(
                f,
                "{} (needed {} words, vacancy {})",
                error_string(TX_FIFO_NO_ROOM),
                needed,
                vacancy
            ),
            FifoError::ErrIrq { flags, words } => write!(
                f,
                "{} (ISR bits 0x{:08x}, {} words transferred)",
                error_string(ERR_IRQ),
                flags.bits(),
                words
            ),
            other => write!(f, "{}", error_string(other.code())),
        }
    }
}

impl Error for FifoError {}

/// A reset command did not report completion in the interrupt status register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResetError {
    pub expected: Interrupts,
    pub observed: Interrupts,
}

impl ResetError {
    pub fn code(&self) -> i32 {
        -1
    }
}

impl Display for ResetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reset did not complete: expected ISR bits 0x{:08x}, read 0x{:08x}",
            self.expected.bits(),
            self.observed.bits()
        )
    }
}

impl Error for ResetError {}
