use crate::{
    error::FifoError,
    fifo::AxisFifo,
    registers::{Interrupts, Register, Registers, WORD_COUNT_MASK},
};

/// Bit 31 of RLR: in cut-through mode the packet is still arriving.
const RLR_PARTIAL: u32 = 0x8000_0000;
/// Byte length field of RLR.
const RLR_LENGTH_MASK: u32 = 0x1FFFF;

/// How the RX side of the core was configured in hardware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RxMode {
    /// Packets become visible while they are still arriving; RLR may be partial.
    CutThrough,
    /// Packets become visible once fully buffered; RLR is final.
    StoreAndForward,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ReadPhase {
    #[default]
    Idle,
    Transferring,
}

/// Progress of the packet currently being read from one RX FIFO.
///
/// Each RX FIFO needs its own state. Sharing one between two cores mixes up
/// their packet boundaries.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ReadState {
    phase: ReadPhase,
    expected_words: usize,
    delivered_words: usize,
    partial: bool,
}

impl ReadState {
    pub fn new() -> ReadState {
        ReadState::default()
    }

    pub fn phase(&self) -> ReadPhase {
        self.phase
    }

    /// `true` when no packet is in flight. After a read, this is the only
    /// reliable end-of-packet signal.
    pub fn is_idle(&self) -> bool {
        self.phase == ReadPhase::Idle
    }

    /// Words of the current packet that have not been handed out yet,
    /// as far as the length register has told us so far.
    pub fn remaining_words(&self) -> usize {
        self.expected_words.saturating_sub(self.delivered_words)
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    fn load_length(&mut self, rlr: u32) {
        self.partial = rlr & RLR_PARTIAL != 0;
        self.expected_words = ((rlr & RLR_LENGTH_MASK) / 4) as usize;
    }
}

/// Result of one read call.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct ReadOutcome {
    /// Words copied into the destination buffer.
    pub words: usize,
    /// The length register reported a packet that is still arriving.
    /// Always `false` in store-and-forward mode.
    pub partial: bool,
}

impl<R: Registers> AxisFifo<R> {
    /// Number of words buffered in the RX FIFO, masked to the 17 valid bits.
    pub fn occupancy(&self) -> u32 {
        self.registers().read(Register::Rdfo) & WORD_COUNT_MASK
    }

    /// Streams the current packet into `dst` without checking occupancy or errors.
    ///
    /// A packet may take several calls. When `state` is idle, the length register is
    /// read to start a new packet. In cut-through mode the length is re-read on each
    /// call while the partial flag is set. Once all words of a complete packet were
    /// handed out, the next call returns zero words and leaves `state` idle.
    ///
    /// Zero words with a non-idle `state` means nothing new arrived yet.
    pub fn unchecked_read(
        &self,
        dst: &mut [u32],
        state: &mut ReadState,
    ) -> Result<ReadOutcome, FifoError> {
        if dst.is_empty() {
            return Err(FifoError::NullArg);
        }
        let regs = self.registers();
        match state.phase {
            ReadPhase::Idle => {
                state.load_length(regs.read(Register::Rlr));
                state.delivered_words = 0;
                state.phase = ReadPhase::Transferring;
            }
            ReadPhase::Transferring => {
                if state.delivered_words >= state.expected_words && !state.partial {
                    state.phase = ReadPhase::Idle;
                    return Ok(ReadOutcome::default());
                }
                if state.partial {
                    // More flits may have streamed in since the last call.
                    state.load_length(regs.read(Register::Rlr));
                }
            }
        }

        let count = dst.len().min(state.remaining_words());
        for slot in &mut dst[..count] {
            *slot = regs.read(Register::Rdfd);
        }
        state.delivered_words += count;
        Ok(ReadOutcome {
            words: count,
            partial: state.partial,
        })
    }

    /// Checks for RX error interrupts and clears them.
    /// Returns the error bits that were set, if any.
    pub fn rx_err(&self) -> Option<Interrupts> {
        let errors = self.interrupts() & Interrupts::RX_ERRORS;
        self.registers().write(Register::Isr, Interrupts::RX_ERRORS.bits());
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    /// Reads up to `dst.len()` words of the current packet and reports error interrupts.
    ///
    /// In store-and-forward mode an empty FIFO yields zero words right away.
    /// If the core flags an RX error, [`FifoError::ErrIrq`] is returned even though
    /// `words` entries of `dst` may already have been filled.
    pub fn read(
        &self,
        mode: RxMode,
        dst: &mut [u32],
        state: &mut ReadState,
    ) -> Result<ReadOutcome, FifoError> {
        if mode == RxMode::StoreAndForward && self.occupancy() == 0 {
            return Ok(ReadOutcome::default());
        }
        self.registers().write(Register::Isr, Interrupts::RX_ERRORS.bits());
        let outcome = self.unchecked_read(dst, state)?;
        match self.rx_err() {
            Some(flags) => Err(FifoError::ErrIrq {
                flags,
                words: outcome.words,
            }),
            None => Ok(outcome),
        }
    }

    /// Drains one complete store-and-forward packet.
    ///
    /// Fails with [`FifoError::RxFifoEmpty`] when nothing is buffered.
    pub fn read_packet(&self, state: &mut ReadState) -> Result<Vec<u32>, FifoError> {
        if state.is_idle() && self.occupancy() == 0 {
            return Err(FifoError::RxFifoEmpty);
        }
        let mut packet = Vec::new();
        let mut chunk = [0u32; 64];
        loop {
            let outcome = self.read(RxMode::StoreAndForward, &mut chunk, state)?;
            packet.extend_from_slice(&chunk[..outcome.words]);
            if state.is_idle() {
                return Ok(packet);
            }
            if outcome.words == 0 && self.occupancy() == 0 {
                if state.remaining_words() > 0 {
                    return Err(FifoError::RxFifoEmpty);
                }
                // The packet is fully drained; this call ends it.
                self.unchecked_read(&mut chunk, state)?;
                return Ok(packet);
            }
        }
    }
}
