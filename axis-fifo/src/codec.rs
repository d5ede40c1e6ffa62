//! [`tokio_util::codec`] support for the word stream a bridge exchanges with its client.
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// One 32-bit word per 4-byte unit, in the host's byte order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct WordCodec;

impl Decoder for WordCodec {
    type Item = u32;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<u32>, io::Error> {
        if src.len() < 4 {
            src.reserve(4 - src.len());
            return Ok(None);
        }
        Ok(Some(src.get_u32_ne()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<u32>, io::Error> {
        match self.decode(src)? {
            Some(word) => Ok(Some(word)),
            None if src.is_empty() => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} trailing bytes do not form a word", src.len()),
            )),
        }
    }
}

impl Encoder<u32> for WordCodec {
    type Error = io::Error;

    fn encode(&mut self, word: u32, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(4);
        dst.put_u32_ne(word);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_waits_for_full_word() {
        let mut buf = BytesMut::from(&0xCAFE_F00Du32.to_ne_bytes()[..3]);
        assert_eq!(WordCodec.decode(&mut buf).unwrap(), None);
        buf.put_u8(0xCAFE_F00Du32.to_ne_bytes()[3]);
        assert_eq!(WordCodec.decode(&mut buf).unwrap(), Some(0xCAFE_F00D));
        assert!(buf.is_empty());
    }

    #[test]
    fn trailing_bytes_at_eof_are_an_error() {
        let mut buf = BytesMut::from(&[1u8, 2][..]);
        let err = WordCodec.decode_eof(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn encode_uses_native_order() {
        let mut buf = BytesMut::new();
        WordCodec.encode(0x0102_0304, &mut buf).unwrap();
        assert_eq!(&buf[..], &0x0102_0304u32.to_ne_bytes());
    }
}
