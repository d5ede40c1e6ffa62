//! Software model of the FIFO core for tests.
//!
//! [`SimFifo`] implements [`Registers`] on top of plain queues. Clones share the
//! same model, so a test can keep one clone for inspection while the driver
//! (possibly on another thread) owns the other.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::registers::{Interrupts, RESET_KEY, Register, Registers};

const DEFAULT_CAPACITY: usize = 512;

/// A data or length register write seen on the TX side.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimWrite {
    Data(u32),
    Length(u32),
}

/// A packet committed through the TX length register.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimPacket {
    pub words: Vec<u32>,
    pub len_bytes: u32,
}

#[derive(Debug)]
struct SimState {
    isr: u32,
    ier: u32,
    tdr: u32,
    rdr: u32,
    capacity: usize,
    reset_echo: bool,
    loopback: bool,
    forced_vacancy: Option<u32>,
    forced_occupancy: Option<u32>,
    raise_on_length: Interrupts,
    tx_pending: Vec<u32>,
    tx_writes: Vec<SimWrite>,
    tx_packets: Vec<SimPacket>,
    rx_data: VecDeque<u32>,
    rx_lengths: VecDeque<u32>,
    scripted_lengths: VecDeque<u32>,
}

#[derive(Clone, Debug)]
pub struct SimFifo {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimFifo {
    fn default() -> Self {
        SimFifo::new()
    }
}

impl SimFifo {
    pub fn new() -> SimFifo {
        SimFifo::with_capacity(DEFAULT_CAPACITY)
    }

    /// A model whose TX FIFO holds `capacity` words.
    pub fn with_capacity(capacity: usize) -> SimFifo {
        SimFifo {
            state: Arc::new(Mutex::new(SimState {
                isr: 0,
                ier: 0,
                tdr: 0,
                rdr: 0,
                capacity,
                reset_echo: true,
                loopback: false,
                forced_vacancy: None,
                forced_occupancy: None,
                raise_on_length: Interrupts::empty(),
                tx_pending: Vec::new(),
                tx_writes: Vec::new(),
                tx_packets: Vec::new(),
                rx_data: VecDeque::new(),
                rx_lengths: VecDeque::new(),
                scripted_lengths: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a reset command sets the matching reset-complete bits.
    pub fn set_reset_echo(&self, echo: bool) {
        self.lock().reset_echo = echo;
    }

    /// Feed every committed TX packet back into the RX side.
    pub fn set_loopback(&self, loopback: bool) {
        self.lock().loopback = loopback;
    }

    /// Overrides the raw value of TDFV.
    pub fn force_vacancy(&self, raw: Option<u32>) {
        self.lock().forced_vacancy = raw;
    }

    /// Overrides the raw value of RDFO.
    pub fn force_occupancy(&self, raw: Option<u32>) {
        self.lock().forced_occupancy = raw;
    }

    /// Sets interrupt status bits as if the core raised them.
    pub fn raise(&self, flags: Interrupts) {
        self.lock().isr |= flags.bits();
    }

    /// Raise `flags` when the next packet is committed.
    pub fn raise_on_next_length(&self, flags: Interrupts) {
        self.lock().raise_on_length = flags;
    }

    /// Raw RLR values returned before any buffered packet lengths.
    pub fn script_lengths(&self, values: &[u32]) {
        self.lock().scripted_lengths.extend(values.iter().copied());
    }

    /// Words available in RDFD, without a matching length entry.
    pub fn push_rx_words(&self, words: &[u32]) {
        self.lock().rx_data.extend(words.iter().copied());
    }

    /// A complete store-and-forward packet.
    pub fn push_rx_packet(&self, words: &[u32]) {
        let mut state = self.lock();
        state.rx_data.extend(words.iter().copied());
        state.rx_lengths.push_back((words.len() * 4) as u32);
    }

    pub fn tx_writes(&self) -> Vec<SimWrite> {
        self.lock().tx_writes.clone()
    }

    pub fn tx_packets(&self) -> Vec<SimPacket> {
        self.lock().tx_packets.clone()
    }

    /// Words not yet read from the RX side.
    pub fn rx_backlog(&self) -> usize {
        self.lock().rx_data.len()
    }

    pub fn interrupts(&self) -> Interrupts {
        Interrupts::from_bits_retain(self.lock().isr)
    }
}

impl SimState {
    fn reset_tx(&mut self) {
        self.tx_pending.clear();
        if self.reset_echo {
            self.isr |= Interrupts::TRC.bits();
        }
    }

    fn reset_rx(&mut self) {
        self.rx_data.clear();
        self.rx_lengths.clear();
        if self.reset_echo {
            self.isr |= Interrupts::RRC.bits();
        }
    }

    fn commit(&mut self, len_bytes: u32) {
        let words = std::mem::take(&mut self.tx_pending);
        if len_bytes == 0 || len_bytes as usize > words.len() * 4 {
            self.isr |= Interrupts::TSE.bits();
        }
        self.isr |= std::mem::replace(&mut self.raise_on_length, Interrupts::empty()).bits();
        self.isr |= Interrupts::TC.bits();
        if self.loopback {
            self.rx_data.extend(words.iter().copied());
            self.rx_lengths.push_back(len_bytes);
            self.isr |= Interrupts::RC.bits();
        }
        self.tx_packets.push(SimPacket { words, len_bytes });
    }
}

impl Registers for SimFifo {
    fn read(&self, reg: Register) -> u32 {
        let mut state = self.lock();
        match reg {
            Register::Isr => state.isr,
            Register::Ier => state.ier,
            Register::Tdfv => state
                .forced_vacancy
                .unwrap_or(state.capacity.saturating_sub(state.tx_pending.len()) as u32),
            Register::Rdfo => state
                .forced_occupancy
                .unwrap_or(state.rx_data.len() as u32),
            Register::Rdfd => match state.rx_data.pop_front() {
                Some(word) => word,
                None => {
                    state.isr |= Interrupts::RPUE.bits();
                    0
                }
            },
            Register::Rlr => {
                if let Some(value) = state.scripted_lengths.pop_front() {
                    value
                } else if let Some(len) = state.rx_lengths.pop_front() {
                    len
                } else {
                    state.isr |= Interrupts::RPURE.bits();
                    0
                }
            }
            Register::Tdr => state.tdr,
            Register::Rdr => state.rdr,
            // Write-only registers read as zero.
            Register::Tdfr | Register::Tdfd | Register::Tlr | Register::Rdfr | Register::Srr => 0,
        }
    }

    fn write(&self, reg: Register, value: u32) {
        let mut state = self.lock();
        match reg {
            Register::Isr => state.isr &= !value,
            Register::Ier => state.ier = value,
            Register::Tdfr if value == RESET_KEY => state.reset_tx(),
            Register::Rdfr if value == RESET_KEY => state.reset_rx(),
            Register::Srr if value == RESET_KEY => {
                state.reset_tx();
                state.reset_rx();
            }
            Register::Tdfd => {
                state.tx_writes.push(SimWrite::Data(value));
                if state.tx_pending.len() >= state.capacity {
                    state.isr |= Interrupts::TPOE.bits();
                } else {
                    state.tx_pending.push(value);
                }
            }
            Register::Tlr => {
                state.tx_writes.push(SimWrite::Length(value));
                state.commit(value);
            }
            Register::Tdr => state.tdr = value,
            Register::Rdr => state.rdr = value,
            _ => {}
        }
    }
}
