//! # Device File Backend
//!
//! For FIFO cores that are reachable through a character device exposing the
//! fabric's physical address window (e.g. `/dev/mpsoc_axiregs`). Offset 0 of
//! the device file corresponds to [`crate::address::WINDOW_START`].
//!
//! ## Example Usage
//!
//! ```ignore
//! let device = DeviceFile::open("/dev/mpsoc_axiregs")?;
//! let (rx, tx) = device.map_fifos(rx_addr, tx_addr)?;
//! let bridge = Builder::new().build(listener, AxisFifo::new(rx), AxisFifo::new(tx));
//! ```
use std::{
    ffi::c_void,
    fs::{File, OpenOptions},
    io,
    num::NonZero,
    os::unix::fs::OpenOptionsExt,
    path::Path,
    ptr::{NonNull, read_volatile, write_volatile},
    sync::Arc,
};

use axis_fifo::{Register, Registers};
use nix::{
    fcntl::OFlag,
    libc::off_t,
    sys::mman::{MapFlags, ProtFlags, mmap, munmap},
};

use crate::address::{FifoAddress, PAGE_SIZE};

/// The opened device file.
pub struct DeviceFile {
    file: File,
}

impl DeviceFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<DeviceFile> {
        let device_path = path.as_ref();
        log::debug!("Opening device file: {}", device_path.display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(device_path)?;
        log::debug!("Device file opened successfully");
        Ok(DeviceFile { file })
    }

    /// Maps the page holding `addr`.
    pub fn map_page(&self, addr: FifoAddress) -> io::Result<MappedPage> {
        let offset = off_t::try_from(addr.file_offset()).map_err(io::Error::other)?;
        let ptr = unsafe {
            log::debug!(
                "Mapping page 0x{:x} (file offset 0x{:x})",
                addr.page_base(),
                offset
            );
            mmap(
                None,
                NonZero::new(PAGE_SIZE).ok_or_else(|| io::Error::other("empty mapping"))?,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &self.file,
                offset,
            )?
        };
        log::info!("Mapped FIFO page at 0x{:x}", addr.page_base());
        Ok(MappedPage {
            ptr,
            page_base: addr.page_base(),
        })
    }

    /// Maps the register blocks of the RX and TX cores.
    /// Both blocks share one mapping when they live in the same page.
    pub fn map_fifos(
        &self,
        rx: FifoAddress,
        tx: FifoAddress,
    ) -> io::Result<(MmioRegisters, MmioRegisters)> {
        let rx_page = Arc::new(self.map_page(rx)?);
        let tx_page = if tx.page_base() == rx.page_base() {
            Arc::clone(&rx_page)
        } else {
            // If this fails, the RX page is unmapped when `rx_page` drops.
            Arc::new(self.map_page(tx)?)
        };
        Ok((
            MmioRegisters::new(rx_page, rx.page_offset()),
            MmioRegisters::new(tx_page, tx.page_offset()),
        ))
    }
}

/// One mapped page of the device window. Unmapped on drop.
pub struct MappedPage {
    ptr: NonNull<c_void>,
    page_base: u64,
}

// SAFETY: The page is device memory, not Rust-owned data. It is only accessed
// through volatile 32-bit loads and stores, and each register block is driven
// by a single thread.
unsafe impl Send for MappedPage {}
unsafe impl Sync for MappedPage {}

impl Drop for MappedPage {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from a successful mmap of PAGE_SIZE bytes and no
        // register handle outlives the page (they hold an Arc to it).
        match unsafe { munmap(self.ptr, PAGE_SIZE) } {
            Ok(()) => log::debug!("Unmapped FIFO page at 0x{:x}", self.page_base),
            Err(e) => log::error!("Could not unmap page at 0x{:x}: {}", self.page_base, e),
        }
    }
}

/// Register block of one FIFO core inside a mapped page.
pub struct MmioRegisters {
    page: Arc<MappedPage>,
    offset: usize,
}

impl MmioRegisters {
    fn new(page: Arc<MappedPage>, offset: usize) -> MmioRegisters {
        MmioRegisters { page, offset }
    }

    /// Physical address of the register block.
    pub fn physical_address(&self) -> u64 {
        self.page.page_base + self.offset as u64
    }

    fn register_ptr(&self, reg: Register) -> *mut u32 {
        // SAFETY: FifoAddress guarantees that offset + the register block fits in the page.
        unsafe {
            self.page
                .ptr
                .as_ptr()
                .cast::<u8>()
                .add(self.offset + reg.offset())
                .cast::<u32>()
        }
    }
}

impl Registers for MmioRegisters {
    fn read(&self, reg: Register) -> u32 {
        // SAFETY: the pointer is 4-byte aligned and inside a live mapping.
        unsafe { read_volatile(self.register_ptr(reg)) }
    }

    fn write(&self, reg: Register, value: u32) {
        // SAFETY: the pointer is 4-byte aligned and inside a live mapping.
        unsafe { write_volatile(self.register_ptr(reg), value) }
    }
}
