//! Position-tracked cursor over an immutable byte slice.
//!
//! Two endianness policies share the same cursor contract: class files are
//! always big-endian, ZIP structures are always little-endian. Rather than
//! carry a runtime flag, the choice is made at the type level so a call site
//! can't accidentally read a class-file integer with the ZIP reader or vice
//! versa.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Debug)]
pub enum ReaderError {
    /// A forward/positioned read's `[begin, end)` range left `[0, len]`.
    Overflow { begin: usize, end: usize, len: usize },
    /// A reverse (EOF-relative) read would cross the forward cursor.
    Underflow { head: usize, tail: usize, size: usize },
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Overflow { begin, end, len } => write!(
                f,
                "read [{}, {}) falls outside buffer of length {}",
                begin, end, len
            ),
            ReaderError::Underflow { head, tail, size } => write!(
                f,
                "reverse read of {} bytes at tail {} would cross head {}",
                size, tail, head
            ),
        }
    }
}

impl std::error::Error for ReaderError {}

pub type ReadResult<T> = Result<T, ReaderError>;

/// Shared cursor behavior for both endianness policies.
///
/// Implementors expose `head`/`tail` bookkeeping and integer decode; the
/// default methods implement the positional-read contract from the byte
/// reader component once over both.
pub trait ByteCursor {
    fn buf(&self) -> &[u8];
    fn head(&self) -> usize;
    fn set_head(&mut self, pos: usize);
    fn tail(&self) -> usize;
    fn set_tail(&mut self, pos: usize);

    fn len(&self) -> usize {
        self.buf().len()
    }

    fn remaining(&self) -> &[u8] {
        &self.buf()[self.head()..self.tail()]
    }

    fn read_bytes(&mut self, n: usize) -> ReadResult<&[u8]> {
        let begin = self.head();
        let end = begin + n;
        if end > self.tail() {
            return Err(ReaderError::Overflow {
                begin,
                end,
                len: self.len(),
            });
        }

        self.set_head(end);
        Ok(&self.buf()[begin..end])
    }

    fn read_bytes_at(&mut self, pos: usize, n: usize) -> ReadResult<&[u8]> {
        self.set_head(pos);
        self.read_bytes(n)
    }

    /// Reads `n` bytes counting back from the current tail, shrinking the
    /// tail. Used for records anchored at EOF (e.g. the ZIP EOCD).
    fn read_bytes_from_end(&mut self, n: usize) -> ReadResult<&[u8]> {
        let tail = self.tail();
        if tail < self.head() + n {
            return Err(ReaderError::Underflow {
                head: self.head(),
                tail,
                size: n,
            });
        }

        let begin = tail - n;
        self.set_tail(begin);
        Ok(&self.buf()[begin..tail])
    }
}

macro_rules! endian_reader {
    ($name:ident, $order:ty) => {
        pub struct $name<'a> {
            buf: &'a [u8],
            head: usize,
            tail: usize,
        }

        impl<'a> $name<'a> {
            pub fn new(buf: &'a [u8]) -> Self {
                $name {
                    buf,
                    head: 0,
                    tail: buf.len(),
                }
            }

            pub fn read_u8(&mut self) -> ReadResult<u8> {
                Ok(self.read_bytes(1)?[0])
            }

            pub fn read_i8(&mut self) -> ReadResult<i8> {
                Ok(self.read_u8()? as i8)
            }

            pub fn read_u16(&mut self) -> ReadResult<u16> {
                Ok(<$order as ByteOrder>::read_u16(self.read_bytes(2)?))
            }

            pub fn read_i16(&mut self) -> ReadResult<i16> {
                Ok(<$order as ByteOrder>::read_i16(self.read_bytes(2)?))
            }

            pub fn read_u32(&mut self) -> ReadResult<u32> {
                Ok(<$order as ByteOrder>::read_u32(self.read_bytes(4)?))
            }

            pub fn read_i32(&mut self) -> ReadResult<i32> {
                Ok(<$order as ByteOrder>::read_i32(self.read_bytes(4)?))
            }

            pub fn read_u64(&mut self) -> ReadResult<u64> {
                Ok(<$order as ByteOrder>::read_u64(self.read_bytes(8)?))
            }

            pub fn read_i64(&mut self) -> ReadResult<i64> {
                Ok(<$order as ByteOrder>::read_i64(self.read_bytes(8)?))
            }

            pub fn read_f32(&mut self) -> ReadResult<f32> {
                Ok(<$order as ByteOrder>::read_f32(self.read_bytes(4)?))
            }

            pub fn read_f64(&mut self) -> ReadResult<f64> {
                Ok(<$order as ByteOrder>::read_f64(self.read_bytes(8)?))
            }
        }

        impl<'a> ByteCursor for $name<'a> {
            fn buf(&self) -> &[u8] {
                self.buf
            }

            fn head(&self) -> usize {
                self.head
            }

            fn set_head(&mut self, pos: usize) {
                self.head = pos;
            }

            fn tail(&self) -> usize {
                self.tail
            }

            fn set_tail(&mut self, pos: usize) {
                self.tail = pos;
            }
        }
    };
}

endian_reader!(BigEndianReader, BigEndian);
endian_reader!(LittleEndianReader, LittleEndian);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_reads_track_head() {
        let data = [0x00, 0x01, 0x00, 0x02, 0xAB];
        let mut r = BigEndianReader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 2);
        assert_eq!(r.head(), 4);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
    }

    #[test]
    fn overflow_on_out_of_bounds_read() {
        let data = [0x00];
        let mut r = BigEndianReader::new(&data);
        match r.read_u16() {
            Err(ReaderError::Overflow { .. }) => {}
            other => panic!("expected Overflow, got {:?}", other),
        }
        // head must not move on a failed read
        assert_eq!(r.head(), 0);
    }

    #[test]
    fn little_endian_reader_decodes_opposite_order() {
        let data = [0x02, 0x00];
        let mut be = BigEndianReader::new(&data);
        let mut le = LittleEndianReader::new(&data);
        assert_eq!(be.read_u16().unwrap(), 0x0200);
        assert_eq!(le.read_u16().unwrap(), 0x0002);
    }

    #[test]
    fn eof_read_shrinks_tail_and_underflows_past_head() {
        let data = [1, 2, 3, 4];
        let mut r = BigEndianReader::new(&data);
        let tail_bytes = r.read_bytes_from_end(2).unwrap();
        assert_eq!(tail_bytes, &[3, 4]);
        assert_eq!(r.tail(), 2);

        match r.read_bytes_from_end(3) {
            Err(ReaderError::Underflow { .. }) => {}
            other => panic!("expected Underflow, got {:?}", other),
        }
    }

    #[test]
    fn positioned_read_sets_head_first() {
        let data = [0xAA, 0xBB, 0x00, 0x2A];
        let mut r = BigEndianReader::new(&data);
        assert_eq!(r.read_bytes_at(2, 2).unwrap(), &[0x00, 0x2A]);
        assert_eq!(r.head(), 4);
    }
}
