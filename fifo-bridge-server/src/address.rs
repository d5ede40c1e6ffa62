//! Physical addresses of FIFO cores inside the device window.
use std::{error::Error, fmt::Display};

/// First physical address served by the device file.
pub const WINDOW_START: u64 = 0xA000_0000;
/// Last physical address a FIFO core may live at.
pub const WINDOW_END: u64 = 0xA0FF_FFFF;
/// Size of one mapping.
pub const PAGE_SIZE: usize = 4096;
/// Bytes covered by the 13 registers of one core.
pub const REGISTER_BLOCK_SIZE: usize = 13 * 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddressError {
    OutOfRange { name: &'static str, addr: u64 },
    Unaligned { name: &'static str, addr: u64 },
    CrossesPage { name: &'static str, addr: u64 },
}

impl Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::OutOfRange { name, addr } => write!(
                f,
                "{} 0x{:x} is out of range (0x{:x}..=0x{:x})",
                name, addr, WINDOW_START, WINDOW_END
            ),
            AddressError::Unaligned { name, addr } => {
                write!(f, "{} 0x{:x} must be 32-bit aligned", name, addr)
            }
            AddressError::CrossesPage { name, addr } => write!(
                f,
                "{} 0x{:x} leaves no room for the register block in its page",
                name, addr
            ),
        }
    }
}

impl Error for AddressError {}

/// A validated FIFO core address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FifoAddress(u64);

impl FifoAddress {
    /// Checks that `addr` lies in the device window, is 32-bit aligned, and that the
    /// whole register block fits in the page it starts in.
    /// `name` is used in error messages.
    pub fn new(name: &'static str, addr: u64) -> Result<FifoAddress, AddressError> {
        if !(WINDOW_START..=WINDOW_END).contains(&addr) {
            return Err(AddressError::OutOfRange { name, addr });
        }
        if addr & 0b11 != 0 {
            return Err(AddressError::Unaligned { name, addr });
        }
        let address = FifoAddress(addr);
        if address.page_offset() + REGISTER_BLOCK_SIZE > PAGE_SIZE {
            return Err(AddressError::CrossesPage { name, addr });
        }
        Ok(address)
    }

    pub fn page_base(&self) -> u64 {
        self.0 & !(PAGE_SIZE as u64 - 1)
    }

    pub fn page_offset(&self) -> usize {
        (self.0 & (PAGE_SIZE as u64 - 1)) as usize
    }

    /// Offset of this address's page within the device file.
    pub fn file_offset(&self) -> u64 {
        self.page_base() - WINDOW_START
    }
}
