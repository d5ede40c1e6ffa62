//! # FIFO Bridge Server
//!
//! Serves one TCP client and bridges it to an AXI4-Stream FIFO core whose
//! registers are reachable through a device file.
//!
//! ## Overview
//!
//! Bytes sent by the client are packed into 32-bit words and pushed into the TX
//! FIFO. Words arriving on the RX FIFO are sent back to the client as 4-byte
//! units. The RX and TX sides may be the same core or two different cores.
//!
//! ```text
//! fifo-bridge <c|s> <RX_ADDR> [TX_ADDR]
//! ```
pub mod address;
pub mod backends;

use std::error::Error;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::PathBuf;

use axis_fifo::{AxisFifo, RxMode};
use clap::{Parser, ValueEnum};
use clap_num::maybe_hex;
use env_logger::Env;
use fifo_bridge::Builder;

use crate::address::FifoAddress;
use crate::backends::devmem::DeviceFile;

const DEFAULT_DEVICE: &str = "/dev/mpsoc_axiregs";

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum Mode {
    /// Cut-through: packets are visible while they still arrive
    #[value(name = "c")]
    CutThrough,
    /// Store-and-forward: packets are visible once complete
    #[value(name = "s")]
    StoreAndForward,
}

impl From<Mode> for RxMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::CutThrough => RxMode::CutThrough,
            Mode::StoreAndForward => RxMode::StoreAndForward,
        }
    }
}

#[derive(Parser)]
#[command(about = "Bridges a TCP client to an AXI4-Stream FIFO", long_about = None)]
struct Args {
    #[arg(help = "How the RX FIFO is configured in hardware")]
    mode: Mode,

    #[arg(
        value_parser = maybe_hex::<u64>,
        help = "Address of the FIFO core receiving flits"
    )]
    rx_addr: u64,

    #[arg(
        value_parser = maybe_hex::<u64>,
        help = "Address of the FIFO core sending commands, if different from RX_ADDR"
    )]
    tx_addr: Option<u64>,

    #[arg(short, long, default_value = "5555")]
    port: u16,

    #[arg(short, long, default_value = "0.0.0.0")]
    ip: IpAddr,

    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting FIFO bridge");

    let args = Args::parse();
    log::debug!(
        "Parsed arguments: mode={:?}, rx_addr=0x{:x}, tx_addr={:x?}",
        args.mode,
        args.rx_addr,
        args.tx_addr
    );

    let rx_addr = FifoAddress::new("RX_ADDR", args.rx_addr)?;
    let tx_addr = match args.tx_addr {
        Some(addr) => FifoAddress::new("TX_ADDR", addr)?,
        None => rx_addr,
    };

    // The socket comes first, before anything touches the hardware.
    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    let listener = TcpListener::bind(addr)?;

    let device = DeviceFile::open(&args.device)?;
    let (rx_regs, tx_regs) = device.map_fifos(rx_addr, tx_addr)?;
    // Mappings stay valid after the file is closed.
    drop(device);
    log::info!(
        "RX FIFO at 0x{:x}, TX FIFO at 0x{:x}",
        rx_regs.physical_address(),
        tx_regs.physical_address()
    );

    let bridge = Builder::new()
        .mode(args.mode.into())
        .build(listener, AxisFifo::new(rx_regs), AxisFifo::new(tx_regs));
    log::debug!("Bridge configuration: {:?}", bridge.config());
    let stop = bridge.stop_handle();
    let mut run = tokio::task::spawn_blocking(move || bridge.run());

    tokio::select! {
        result = &mut run => result??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("Interrupted, shutting down");
            stop.request();
            run.await??;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rx_address_only() {
        let args = Args::try_parse_from(["fifo-bridge", "s", "0xA0000000"]).unwrap();
        assert_eq!(args.mode, Mode::StoreAndForward);
        assert_eq!(args.rx_addr, 0xA000_0000);
        assert_eq!(args.tx_addr, None);
        assert_eq!(args.port, 5555);
        assert_eq!(args.device, PathBuf::from(DEFAULT_DEVICE));
    }

    #[test]
    fn separate_tx_address() {
        let args =
            Args::try_parse_from(["fifo-bridge", "c", "0xA0001000", "0xA0002000", "-p", "6000"])
                .unwrap();
        assert_eq!(RxMode::from(args.mode), RxMode::CutThrough);
        assert_eq!(args.tx_addr, Some(0xA000_2000));
        assert_eq!(args.port, 6000);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Args::try_parse_from(["fifo-bridge", "x", "0xA0000000"]).is_err());
    }
}
