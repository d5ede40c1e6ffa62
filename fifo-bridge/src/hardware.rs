//! FIFO half of the bridge: the `fifo-mgr` and `fifo-tx` threads.
use std::{sync::Arc, thread};

use axis_fifo::{AxisFifo, ReadState, Registers, RxMode, error::FifoError};

use crate::{
    control::StopFlag,
    queue::{Consumer, Producer},
    sender::SenderGuard,
};

const UNIT: usize = 4;

fn log_fifo_error(context: &str, err: &FifoError) {
    log::error!("{}: {}", context, err);
    if let FifoError::ErrIrq { flags, .. } = err {
        for info in flags.describe() {
            log::error!("    {}", info);
        }
    }
}

/// Body of `fifo-tx`: sends every 4-byte unit from `egress` as one word packet.
///
/// A full TX FIFO is retried until there is room, since the vacancy register is
/// the only backpressure. A shorter trailing unit is sent through the byte path so
/// the length register carries its exact size.
pub(crate) fn fifo_sender<T: Registers>(tx: AxisFifo<T>, egress: Consumer) {
    while let Some(unit) = egress.read_exact(UNIT) {
        log::trace!("fifo-tx: {:02x?}", &unit[..]);
        let result = loop {
            let result = match <[u8; UNIT]>::try_from(&unit[..]) {
                Ok(bytes) => tx.send_words(&[u32::from_ne_bytes(bytes)]),
                Err(_) => tx.send(&unit),
            };
            match result {
                Err(FifoError::TxFifoNoRoom { .. }) if !egress.queue().producers_aborted() => {
                    thread::yield_now()
                }
                other => break other,
            }
        };
        if let Err(e) = result {
            log_fifo_error("TX FIFO send failed", &e);
            break;
        }
    }
    log::debug!("fifo-tx exiting");
}

/// Body of `fifo-mgr`.
///
/// Polls the RX FIFO one word at a time and forwards each word into `ingress`
/// until `stop` is requested or the core reports an error. `egress` and the TX
/// FIFO are handed to the `fifo-tx` thread.
///
/// Teardown order on every exit path: close `egress` for production and join
/// `fifo-tx`, then release `ingress`.
pub(crate) fn fifo_manager<R, T>(
    rx: AxisFifo<R>,
    tx: AxisFifo<T>,
    mode: RxMode,
    ingress: Producer,
    egress: Consumer,
    stop: StopFlag,
) where
    R: Registers,
    T: Registers + 'static,
{
    let egress_queue = Arc::clone(egress.queue());
    let _sender = match SenderGuard::spawn("fifo-tx", egress_queue, move || {
        fifo_sender(tx, egress)
    }) {
        Ok(sender) => sender,
        Err(e) => {
            log::error!("Could not spawn fifo-tx: {}", e);
            return;
        }
    };

    let mut state = ReadState::new();
    let mut word = [0u32; 1];
    while !stop.is_requested() {
        // Reading RLR with nothing buffered is an underrun, even in cut-through mode.
        if mode == RxMode::CutThrough && state.is_idle() && rx.occupancy() == 0 {
            thread::yield_now();
            continue;
        }
        match rx.read(mode, &mut word, &mut state) {
            Ok(outcome) if outcome.words == 1 => {
                log::trace!("fifo-mgr: 0x{:08x}", word[0]);
                ingress.write(&word[0].to_ne_bytes());
            }
            // No interrupt line to wait on; give the other threads a chance.
            Ok(_) => thread::yield_now(),
            Err(e) => {
                log_fifo_error("RX FIFO read failed", &e);
                break;
            }
        }
    }
    log::debug!("fifo-mgr exiting");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::queue::ByteQueue;
    use axis_fifo::{
        Interrupts,
        sim::{SimFifo, SimPacket},
    };
    use std::time::{Duration, Instant};

    #[test]
    fn sender_sends_words_then_trailing_bytes() {
        let sim = SimFifo::new();
        let queue = ByteQueue::new();
        let producer = queue.producer();
        let consumer = queue.consumer();
        producer.write(&0x1234_5678u32.to_ne_bytes());
        producer.write(&[0xAB, 0xCD]);
        drop(producer);

        fifo_sender(AxisFifo::new(sim.clone()), consumer);
        assert_eq!(
            sim.tx_packets(),
            vec![
                SimPacket {
                    words: vec![0x1234_5678],
                    len_bytes: 4
                },
                SimPacket {
                    words: vec![0xABCD_0000],
                    len_bytes: 2
                },
            ]
        );
    }

    #[test]
    fn sender_stops_on_error_interrupt() {
        let sim = SimFifo::new();
        let queue = ByteQueue::new();
        let producer = queue.producer();
        let consumer = queue.consumer();
        producer.write(&[0; 12]);
        sim.raise_on_next_length(Interrupts::TSE);

        fifo_sender(AxisFifo::new(sim.clone()), consumer);
        assert_eq!(sim.tx_packets().len(), 1);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn sender_waiting_for_room_gives_up_on_abort() {
        let sim = SimFifo::new();
        sim.force_vacancy(Some(0));
        let queue = ByteQueue::new();
        let producer = queue.producer();
        let consumer = queue.consumer();
        producer.write(&[1, 2, 3, 4]);

        let sender = thread::spawn({
            let sim = sim.clone();
            move || fifo_sender(AxisFifo::new(sim), consumer)
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!sender.is_finished());
        queue.abort_producers();
        sender.join().unwrap();
        assert!(sim.tx_packets().is_empty());
    }

    #[test]
    fn manager_forwards_rx_words_and_stops() {
        let rx = SimFifo::new();
        let tx = SimFifo::new();
        rx.push_rx_packet(&[0xAAAA_0001, 0xAAAA_0002]);
        rx.push_rx_packet(&[0xAAAA_0003]);

        let to_client = ByteQueue::new();
        let to_fifo = ByteQueue::new();
        let ingress = to_client.producer();
        let egress = to_fifo.consumer();
        let reader = to_client.consumer();
        let stop = StopFlag::new();

        let manager = thread::spawn({
            let (rx, tx, stop) = (rx.clone(), tx.clone(), stop.clone());
            move || {
                fifo_manager(
                    AxisFifo::new(rx),
                    AxisFifo::new(tx),
                    RxMode::StoreAndForward,
                    ingress,
                    egress,
                    stop,
                )
            }
        });

        let mut words = Vec::new();
        for _ in 0..3 {
            let unit = reader.read_exact(4).unwrap();
            words.push(u32::from_ne_bytes(unit[..].try_into().unwrap()));
        }
        assert_eq!(words, vec![0xAAAA_0001, 0xAAAA_0002, 0xAAAA_0003]);

        // fifo-tx is blocked on an empty queue; the stop must still get it out.
        stop.request();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !manager.is_finished() {
            assert!(Instant::now() < deadline, "fifo-mgr did not stop");
            thread::sleep(Duration::from_millis(5));
        }
        manager.join().unwrap();
        assert!(to_fifo.producers_aborted());
        assert_eq!(reader.read_exact(4), None);
    }

    #[test]
    fn cut_through_manager_waits_out_an_idle_fifo() {
        let rx = SimFifo::new();
        rx.push_rx_packet(&[0xBBBB_0001, 0xBBBB_0002]);
        let to_client = ByteQueue::new();
        let to_fifo = ByteQueue::new();
        let ingress = to_client.producer();
        let egress = to_fifo.consumer();
        let reader = to_client.consumer();
        let stop = StopFlag::new();

        let manager = thread::spawn({
            let (rx, stop) = (rx.clone(), stop.clone());
            move || {
                fifo_manager(
                    AxisFifo::new(rx),
                    AxisFifo::new(SimFifo::new()),
                    RxMode::CutThrough,
                    ingress,
                    egress,
                    stop,
                )
            }
        });

        let read_word = || {
            let unit = reader.read_exact(4).unwrap();
            u32::from_ne_bytes(unit[..].try_into().unwrap())
        };
        assert_eq!(read_word(), 0xBBBB_0001);
        assert_eq!(read_word(), 0xBBBB_0002);

        // Nothing buffered for a while: the manager must keep polling.
        thread::sleep(Duration::from_millis(50));
        assert!(!manager.is_finished());
        assert!(!rx.interrupts().intersects(Interrupts::RX_ERRORS));

        rx.push_rx_packet(&[0xBBBB_0003]);
        assert_eq!(read_word(), 0xBBBB_0003);

        stop.request();
        manager.join().unwrap();
        assert_eq!(reader.read_exact(4), None);
    }

    #[test]
    fn manager_exits_on_rx_error() {
        let rx = SimFifo::new();
        // Data without a packet length: reading RLR underruns.
        rx.push_rx_words(&[1]);
        let to_client = ByteQueue::new();
        let to_fifo = ByteQueue::new();
        let ingress = to_client.producer();
        let egress = to_fifo.consumer();
        let reader = to_client.consumer();

        fifo_manager(
            AxisFifo::new(rx),
            AxisFifo::new(SimFifo::new()),
            RxMode::StoreAndForward,
            ingress,
            egress,
            StopFlag::new(),
        );
        assert_eq!(reader.read_exact(4), None);
    }
}
