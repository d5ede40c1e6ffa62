use std::fmt::Display;

use bitflags::bitflags;

/// Value that triggers a reset when written to TDFR, RDFR or SRR.
pub const RESET_KEY: u32 = 0xA5;

/// The vacancy and occupancy registers only carry valid data in their low 17 bits.
pub const WORD_COUNT_MASK: u32 = 0x1FFFF;

/// Registers of the AXI4-Stream FIFO core, in address order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(usize)]
pub enum Register {
    /// Interrupt status (write 1 to clear)
    Isr = 0,
    /// Interrupt enable
    Ier,
    /// TX FIFO reset
    Tdfr,
    /// TX FIFO vacancy
    Tdfv,
    /// TX FIFO data
    Tdfd,
    /// TX length
    Tlr,
    /// RX FIFO reset
    Rdfr,
    /// RX FIFO occupancy
    Rdfo,
    /// RX FIFO data
    Rdfd,
    /// RX length
    Rlr,
    /// Reset of the whole core
    Srr,
    /// TX destination
    Tdr,
    /// RX destination
    Rdr,
}

impl Register {
    pub const ALL: [Register; 13] = [
        Register::Isr,
        Register::Ier,
        Register::Tdfr,
        Register::Tdfv,
        Register::Tdfd,
        Register::Tlr,
        Register::Rdfr,
        Register::Rdfo,
        Register::Rdfd,
        Register::Rlr,
        Register::Srr,
        Register::Tdr,
        Register::Rdr,
    ];

    /// Byte offset of the register from the start of the register block.
    pub const fn offset(self) -> usize {
        self as usize * 4
    }
}

/// Raw access to one register block.
///
/// Every access has hardware side effects: reading the data registers consumes
/// a FIFO entry, writing the reset registers resets the core.
/// Implementations must perform exactly one load or store per call.
///
/// There is no locking. Each block is expected to be driven by a single thread.
pub trait Registers: Send {
    fn read(&self, reg: Register) -> u32;

    fn write(&self, reg: Register, value: u32);
}

bitflags! {
    /// Bits of the interrupt status register.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct Interrupts: u32 {
        /// Receive packet underrun read error
        const RPURE = 0x8000_0000;
        /// Receive packet overrun read error
        const RPORE = 0x4000_0000;
        /// Receive packet underrun error
        const RPUE = 0x2000_0000;
        /// Transmit packet overrun error
        const TPOE = 0x1000_0000;
        /// Transmit complete
        const TC = 0x0800_0000;
        /// Receive complete
        const RC = 0x0400_0000;
        /// Transmit size error
        const TSE = 0x0200_0000;
        /// Transmit reset complete
        const TRC = 0x0100_0000;
        /// Receive reset complete
        const RRC = 0x0080_0000;
        /// TX FIFO programmable full
        const TFPF = 0x0040_0000;
        /// TX FIFO programmable empty
        const TFPE = 0x0020_0000;
        /// RX FIFO programmable full
        const RFPF = 0x0010_0000;
        /// RX FIFO programmable empty
        const RFPE = 0x0008_0000;

        const TX_ERRORS = Self::TPOE.bits() | Self::TSE.bits();
        const RX_ERRORS = Self::RPURE.bits() | Self::RPORE.bits() | Self::RPUE.bits();
        const RESET_COMPLETE = Self::TRC.bits() | Self::RRC.bits();
    }
}

const DESCRIPTIONS: [(Interrupts, bool, &str); 13] = [
    (Interrupts::RPURE, true, "tried reading RLR when it was empty"),
    (Interrupts::RPORE, true, "tried to read too many words from RX FIFO"),
    (Interrupts::RPUE, true, "tried to read from RX FIFO when it was empty"),
    (Interrupts::TPOE, true, "tried to write to TX FIFO when it was full"),
    (Interrupts::TC, false, "transmit complete"),
    (Interrupts::RC, false, "receive complete"),
    (Interrupts::TSE, true, "size given in TLR did not make sense"),
    (Interrupts::TRC, false, "transmit reset complete"),
    (Interrupts::RRC, false, "receive reset complete"),
    (Interrupts::TFPF, false, "TX FIFO programmable full"),
    (Interrupts::TFPE, false, "TX FIFO programmable empty"),
    (Interrupts::RFPF, false, "RX FIFO programmable full"),
    (Interrupts::RFPE, false, "RX FIFO programmable empty"),
];

/// One set interrupt bit with a human readable explanation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterruptInfo {
    pub flag: Interrupts,
    pub is_error: bool,
    pub text: &'static str,
}

impl Display for InterruptInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error {
            write!(f, "(ERROR) {}", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

impl Interrupts {
    /// Explains every set bit, most significant first.
    /// Bits outside the documented set are ignored.
    pub fn describe(self) -> impl Iterator<Item = InterruptInfo> {
        DESCRIPTIONS
            .into_iter()
            .filter(move |(flag, _, _)| self.contains(*flag))
            .map(|(flag, is_error, text)| InterruptInfo {
                flag,
                is_error,
                text,
            })
    }
}

#[test]
fn register_offsets_follow_declaration_order() {
    assert_eq!(Register::Isr.offset(), 0x00);
    assert_eq!(Register::Tdfd.offset(), 0x10);
    assert_eq!(Register::Rlr.offset(), 0x24);
    assert_eq!(Register::Rdr.offset(), 0x30);
    for (index, reg) in Register::ALL.iter().enumerate() {
        assert_eq!(reg.offset(), index * 4);
    }
}

#[test]
fn composite_masks() {
    assert_eq!(Interrupts::TX_ERRORS.bits(), 0x1200_0000);
    assert_eq!(Interrupts::RX_ERRORS.bits(), 0xE000_0000);
    assert_eq!(Interrupts::RESET_COMPLETE.bits(), 0x0180_0000);
}

#[test]
fn describe_lists_set_bits_in_order() {
    let isr = Interrupts::from_bits_retain(0x8000_0000 | 0x0100_0000 | 0x1);
    let lines: Vec<String> = isr.describe().map(|info| info.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "(ERROR) tried reading RLR when it was empty".to_string(),
            "transmit reset complete".to_string(),
        ]
    );
}
