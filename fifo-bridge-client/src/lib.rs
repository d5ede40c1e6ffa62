//! # FIFO Bridge Client
//!
//! A small blocking client for a `fifo-bridge` server.
//!
//! ## Overview
//!
//! The bridge has no framing of its own. Everything the client sends is
//! repacked into 32-bit words and written to the TX FIFO; every word that
//! arrives on the RX FIFO is sent back as one 4-byte unit in the server's
//! native byte order.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use fifo_bridge_client::BridgeClient;
//!
//! let mut client = BridgeClient::connect("192.168.1.10:5555")?;
//! client.send_words(&[0x0000_0001, 0x0000_00FF])?;
//! let reply = client.recv_word()?;
//! ```
use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use bytes::{Buf, BufMut, BytesMut};

const UNIT: usize = 4;

/// Connection to a bridge server.
pub struct BridgeClient {
    tcp: TcpStream,
}

impl BridgeClient {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<BridgeClient> {
        let tcp = TcpStream::connect(addr)?;
        tcp.set_nodelay(true)?;
        Ok(BridgeClient { tcp })
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp.set_read_timeout(timeout)
    }

    /// Sends raw bytes. The server packs them into words as they arrive.
    pub fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.tcp.write_all(data)
    }

    /// Sends words in native byte order, one TX FIFO word each.
    pub fn send_words(&mut self, words: &[u32]) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(words.len() * UNIT);
        for word in words {
            buf.put_u32_ne(*word);
        }
        self.tcp.write_all(&buf)
    }

    /// Receives one RX FIFO word.
    pub fn recv_word(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; UNIT];
        self.tcp.read_exact(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    /// Receives exactly `count` RX FIFO words.
    pub fn recv_words(&mut self, count: usize) -> io::Result<Vec<u32>> {
        let mut buf = BytesMut::zeroed(count * UNIT);
        self.tcp.read_exact(&mut buf)?;
        let mut words = Vec::with_capacity(count);
        while buf.has_remaining() {
            words.push(buf.get_u32_ne());
        }
        Ok(words)
    }

    /// Closes both directions. The server treats this as a disconnect.
    pub fn shutdown(&self) -> io::Result<()> {
        self.tcp.shutdown(Shutdown::Both)
    }
}
