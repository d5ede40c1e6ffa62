use std::cell::Cell;
use std::hint::black_box;

use axis_fifo::{AxisFifo, Register, Registers};
use criterion::{Criterion, criterion_group, criterion_main};

/// Register block that only remembers the last write.
struct Sink {
    last: Cell<u32>,
}

impl Registers for Sink {
    fn read(&self, _reg: Register) -> u32 {
        0x1FFFF
    }

    fn write(&self, _reg: Register, value: u32) {
        self.last.set(value);
    }
}

fn pack_bytes(c: &mut Criterion) {
    let fifo = AxisFifo::new(Sink { last: Cell::new(0) });
    let buf = vec![0xA5u8; 4093];
    c.bench_function("unchecked_send 4093 bytes", |b| {
        b.iter(|| fifo.unchecked_send(black_box(&buf)))
    });
}

fn send_words(c: &mut Criterion) {
    let fifo = AxisFifo::new(Sink { last: Cell::new(0) });
    let words = vec![0xDEAD_BEEFu32; 1024];
    c.bench_function("send_words 1024 words", |b| {
        b.iter(|| fifo.send_words(black_box(&words)))
    });
}

criterion_group!(benches, pack_bytes, send_words);
criterion_main!(benches);
