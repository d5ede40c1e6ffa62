use crate::{
    error::{FifoError, ResetError},
    registers::{Interrupts, RESET_KEY, Register, Registers, WORD_COUNT_MASK},
};

/// Driver for one AXI4-Stream FIFO core.
///
/// Owns the handle to the register block. The driver keeps no state of its own;
/// the RX read protocol state lives in a caller-owned [`crate::ReadState`].
#[derive(Debug)]
pub struct AxisFifo<R: Registers> {
    regs: R,
}

/// Packs up to four bytes into a word, first byte in the most significant position.
/// Missing trailing bytes are zero.
pub(crate) fn pack_word(chunk: &[u8]) -> u32 {
    debug_assert!(!chunk.is_empty() && chunk.len() <= 4);
    let mut buf = [0u8; 4];
    buf[..chunk.len()].copy_from_slice(chunk);
    u32::from_be_bytes(buf)
}

impl<R: Registers> AxisFifo<R> {
    pub fn new(regs: R) -> AxisFifo<R> {
        AxisFifo { regs }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Reads the interrupt status register without clearing anything.
    pub fn interrupts(&self) -> Interrupts {
        Interrupts::from_bits_retain(self.regs.read(Register::Isr))
    }

    /// Clears every pending interrupt. Returns what was pending before.
    pub fn clear_interrupts(&self) -> Interrupts {
        let isr = self.interrupts();
        self.regs.write(Register::Isr, 0xFFFF_FFFF);
        isr
    }

    fn reset(&self, reset_reg: Register, done: Interrupts) -> Result<(), ResetError> {
        // Only the completion bits we are about to wait for are cleared.
        self.regs.write(Register::Isr, done.bits());
        self.regs.write(reset_reg, RESET_KEY);
        let observed = self.interrupts();
        if observed.contains(done) {
            Ok(())
        } else {
            Err(ResetError {
                expected: done,
                observed,
            })
        }
    }

    /// Resets the TX logic.
    pub fn reset_tx(&self) -> Result<(), ResetError> {
        self.reset(Register::Tdfr, Interrupts::TRC)
    }

    /// Resets the RX logic.
    pub fn reset_rx(&self) -> Result<(), ResetError> {
        self.reset(Register::Rdfr, Interrupts::RRC)
    }

    /// Resets the whole core. Succeeds only when both reset-complete bits are reported.
    pub fn reset_all(&self) -> Result<(), ResetError> {
        self.reset(Register::Srr, Interrupts::RESET_COMPLETE)
    }

    /// Free space in the TX FIFO in 32-bit words.
    ///
    /// The core reports this quantity in a 17 bit field.
    pub fn vacancy(&self) -> u32 {
        self.regs.read(Register::Tdfv) & WORD_COUNT_MASK
    }

    /// Sends a byte buffer as one packet without checking vacancy or errors.
    ///
    /// Every word is packed first-byte-most-significant. The CPU-to-fabric path swaps
    /// the bytes of each 32-bit transfer, so this cancels out and the peer sees the
    /// bytes in buffer order. A trailing partial word is zero padded.
    /// The exact byte count is committed to the length register, which ends the packet.
    pub fn unchecked_send(&self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        for chunk in buf.chunks(4) {
            self.regs.write(Register::Tdfd, pack_word(chunk));
        }
        self.regs.write(Register::Tlr, buf.len() as u32);
    }

    /// Sends pre-packed words as one packet without checking vacancy or errors.
    pub fn unchecked_send_words(&self, words: &[u32]) {
        if words.is_empty() {
            return;
        }
        for word in words {
            self.regs.write(Register::Tdfd, *word);
        }
        self.regs.write(Register::Tlr, (words.len() * 4) as u32);
    }

    /// Checks for TX error interrupts and clears them.
    /// Returns the error bits that were set, if any.
    pub fn tx_err(&self) -> Option<Interrupts> {
        let errors = self.interrupts() & Interrupts::TX_ERRORS;
        self.regs.write(Register::Isr, Interrupts::TX_ERRORS.bits());
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    fn checked_send(&self, words: usize, send: impl FnOnce()) -> Result<(), FifoError> {
        let vacancy = self.vacancy();
        if (vacancy as usize) < words {
            return Err(FifoError::TxFifoNoRoom {
                needed: words,
                vacancy,
            });
        }
        // Stale error bits would be blamed on this transfer otherwise.
        self.regs.write(Register::Isr, Interrupts::TX_ERRORS.bits());
        send();
        match self.tx_err() {
            Some(flags) => Err(FifoError::ErrIrq { flags, words }),
            None => Ok(()),
        }
    }

    /// Sends a byte buffer as one packet after checking that it fits,
    /// and reports error interrupts raised by the transfer.
    pub fn send(&self, buf: &[u8]) -> Result<(), FifoError> {
        self.checked_send(buf.len().div_ceil(4), || self.unchecked_send(buf))
    }

    /// Word variant of [`AxisFifo::send`].
    pub fn send_words(&self, words: &[u32]) -> Result<(), FifoError> {
        self.checked_send(words.len(), || self.unchecked_send_words(words))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimFifo, SimWrite};

    #[test]
    fn pack_word_is_msb_first() {
        assert_eq!(pack_word(&[0x11, 0x22, 0x33, 0x44]), 0x1122_3344);
        assert_eq!(pack_word(&[0xAB]), 0xAB00_0000);
        assert_eq!(pack_word(&[0xAB, 0xCD, 0xEF]), 0xABCD_EF00);
    }

    #[test]
    fn short_buffers_fill_one_word_and_commit_exact_length() {
        let expected = [0xAA00_0000, 0xAABB_0000, 0xAABB_CC00, 0xAABB_CCDD];
        let bytes = [0xAA, 0xBB, 0xCC, 0xDD];
        for len in 1..=4 {
            let sim = SimFifo::new();
            let fifo = AxisFifo::new(sim.clone());
            fifo.unchecked_send(&bytes[..len]);
            assert_eq!(
                sim.tx_writes(),
                vec![SimWrite::Data(expected[len - 1]), SimWrite::Length(len as u32)]
            );
        }
    }

    #[test]
    fn multi_word_buffer() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        fifo.unchecked_send(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            sim.tx_writes(),
            vec![
                SimWrite::Data(0x0102_0304),
                SimWrite::Data(0x0506_0000),
                SimWrite::Length(6),
            ]
        );
    }

    #[test]
    fn empty_send_is_noop() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        fifo.unchecked_send(&[]);
        fifo.unchecked_send_words(&[]);
        assert!(sim.tx_writes().is_empty());
    }

    #[test]
    fn words_are_not_swapped() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        fifo.send_words(&[0xDEAD_BEEF, 0x0000_0001]).unwrap();
        assert_eq!(
            sim.tx_writes(),
            vec![
                SimWrite::Data(0xDEAD_BEEF),
                SimWrite::Data(0x0000_0001),
                SimWrite::Length(8),
            ]
        );
    }

    #[test]
    fn vacancy_is_masked_to_17_bits() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        sim.force_vacancy(Some(0xFFFF_FFFF));
        assert_eq!(fifo.vacancy(), 0x1FFFF);
        sim.force_vacancy(Some(0x0002_0005));
        assert_eq!(fifo.vacancy(), 5);
    }

    #[test]
    fn send_without_room_fails_before_writing() {
        let sim = SimFifo::with_capacity(2);
        let fifo = AxisFifo::new(sim.clone());
        assert_eq!(
            fifo.send(&[0; 9]),
            Err(FifoError::TxFifoNoRoom {
                needed: 3,
                vacancy: 2
            })
        );
        assert!(sim.tx_writes().is_empty());
        assert_eq!(fifo.send(&[0; 8]), Ok(()));
    }

    #[test]
    fn stale_tx_errors_are_cleared_before_sending() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        sim.raise(Interrupts::TSE | Interrupts::RC);
        assert_eq!(fifo.send_words(&[1]), Ok(()));
        // Only the TX error bits are touched.
        let isr = fifo.interrupts();
        assert!(isr.contains(Interrupts::RC));
        assert!(!isr.intersects(Interrupts::TX_ERRORS));
    }

    #[test]
    fn tx_error_during_send_is_reported_and_cleared() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        sim.raise_on_next_length(Interrupts::TSE);
        assert_eq!(
            fifo.send_words(&[1, 2]),
            Err(FifoError::ErrIrq {
                flags: Interrupts::TSE,
                words: 2
            })
        );
        assert_eq!(fifo.tx_err(), None);
    }

    #[test]
    fn reset_all_succeeds_when_core_reports_completion() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        assert_eq!(fifo.reset_all(), Ok(()));
        assert_eq!(fifo.reset_tx(), Ok(()));
        assert_eq!(fifo.reset_rx(), Ok(()));
    }

    #[test]
    fn reset_all_fails_when_completion_never_reported() {
        let sim = SimFifo::new();
        sim.set_reset_echo(false);
        let fifo = AxisFifo::new(sim.clone());
        let err = fifo.reset_all().unwrap_err();
        assert_eq!(err.code(), -1);
        assert_eq!(err.expected, Interrupts::RESET_COMPLETE);
        assert_eq!(fifo.reset_tx().unwrap_err().expected, Interrupts::TRC);
    }

    #[test]
    fn reset_clears_stale_completion_bit_first() {
        let sim = SimFifo::new();
        // A stale TRC must not be mistaken for a fresh completion.
        sim.raise(Interrupts::TRC);
        sim.set_reset_echo(false);
        let fifo = AxisFifo::new(sim.clone());
        assert!(fifo.reset_tx().is_err());
    }

    #[test]
    fn clear_interrupts_returns_previous_value() {
        let sim = SimFifo::new();
        let fifo = AxisFifo::new(sim.clone());
        sim.raise(Interrupts::TC | Interrupts::RPUE);
        assert_eq!(fifo.clear_interrupts(), Interrupts::TC | Interrupts::RPUE);
        assert_eq!(fifo.interrupts(), Interrupts::empty());
    }
}
