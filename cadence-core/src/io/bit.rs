// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::io;

fn end_of_bitstream_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::Other, "unexpected end of bitstream"))
}

/// `ReadBitsLtr` reads bits from most-significant to least-significant.
///
/// Implementors only need to provide the primitive read and skip operations. Bit cursors over
/// owned circular buffers, such as the Layer III bit reservoir, implement this trait as well as
/// the slice-backed [`BitReaderLtr`].
pub trait ReadBitsLtr {
    /// Reads up to 32-bits and returns them right-aligned in a `u32`, or returns an error.
    fn read_bits_leq32(&mut self, bit_width: u32) -> io::Result<u32>;

    /// Ignores the specified number of bits from the stream or returns an error.
    fn ignore_bits(&mut self, num_bits: u32) -> io::Result<()>;

    /// Read a single bit as a boolean value or returns an error.
    #[inline(always)]
    fn read_bit(&mut self) -> io::Result<bool> {
        Ok(self.read_bits_leq32(1)? == 1)
    }
}

/// `BitReaderLtr` reads bits from most-significant to least-significant from any `&[u8]`.
///
/// Stated another way, if N-bits are read from a `BitReaderLtr` then bit 0, the first bit read,
/// is the most-significant bit, and bit N-1, the last bit read, is the least-significant.
pub struct BitReaderLtr<'a> {
    buf: &'a [u8],
    bits: u64,
    n_bits_left: u32,
    n_bits_read: u64,
}

impl<'a> BitReaderLtr<'a> {
    /// Instantiate a new `BitReaderLtr` with the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReaderLtr { buf, bits: 0, n_bits_left: 0, n_bits_read: 0 }
    }

    /// Gets the number of bits consumed since the reader was created.
    pub fn bits_read(&self) -> u64 {
        self.n_bits_read
    }

    /// Gets the number of bits left unread.
    pub fn bits_left(&self) -> u64 {
        (8 * self.buf.len() as u64) + u64::from(self.n_bits_left)
    }

    /// Discards any bits left in the current byte so the next read is byte-aligned.
    pub fn realign(&mut self) {
        let skip = self.n_bits_left & 0x7;
        self.consume_bits(skip);
    }

    fn fetch_bits(&mut self) -> io::Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let read_len = min(self.buf.len(), std::mem::size_of::<u64>());

        if read_len == 0 {
            return end_of_bitstream_error();
        }

        buf[..read_len].copy_from_slice(&self.buf[..read_len]);

        self.buf = &self.buf[read_len..];

        self.bits = u64::from_be_bytes(buf);
        self.n_bits_left = (read_len as u32) << 3;

        Ok(())
    }

    #[inline(always)]
    fn consume_bits(&mut self, num: u32) {
        self.n_bits_left -= num;
        self.n_bits_read += u64::from(num);
        // Shift in two parts to avoid overflowing when num == 64.
        self.bits = (self.bits << (num >> 1)) << (num - (num >> 1));
    }
}

impl ReadBitsLtr for BitReaderLtr<'_> {
    #[inline(always)]
    fn read_bits_leq32(&mut self, mut bit_width: u32) -> io::Result<u32> {
        debug_assert!(bit_width <= u32::BITS);

        // Shift in two 32-bit operations so that bit_width == 0 never shifts by 64 bits.
        let mut bits = (self.bits >> u32::BITS) >> (u32::BITS - bit_width);

        while bit_width > self.n_bits_left {
            bit_width -= self.n_bits_left;
            self.n_bits_read += u64::from(self.n_bits_left);

            self.fetch_bits()?;

            // bit_width is always > 0 here.
            bits |= self.bits >> (u64::BITS - bit_width);
        }

        self.consume_bits(bit_width);

        Ok(bits as u32)
    }

    fn ignore_bits(&mut self, mut num_bits: u32) -> io::Result<()> {
        if num_bits <= self.n_bits_left {
            self.consume_bits(num_bits);
        }
        else {
            // Consume whole bit caches directly.
            while num_bits > self.n_bits_left {
                num_bits -= self.n_bits_left;
                self.n_bits_read += u64::from(self.n_bits_left);
                self.fetch_bits()?;
            }

            self.consume_bits(num_bits);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BitReaderLtr, ReadBitsLtr};

    #[test]
    #[allow(clippy::bool_assert_comparison)]
    fn verify_bitreaderltr_ignore_bits() {
        let mut bs = BitReaderLtr::new(&[
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
            0xc0, 0x10, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0a, //
        ]);

        assert_eq!(bs.read_bit().unwrap(), true);

        bs.ignore_bits(128).unwrap();

        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), false);

        bs.ignore_bits(7).unwrap();

        assert_eq!(bs.read_bit().unwrap(), true);

        bs.ignore_bits(19).unwrap();

        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), false);

        bs.ignore_bits(24).unwrap();

        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);

        // Lower limit test.
        let mut bs = BitReaderLtr::new(&[0x00]);

        assert!(bs.ignore_bits(0).is_ok());

        let mut bs = BitReaderLtr::new(&[]);

        assert!(bs.ignore_bits(0).is_ok());
        assert!(bs.ignore_bits(1).is_err());

        // Upper limit test.
        let mut bs = BitReaderLtr::new(&[0xff; 32]);

        assert!(bs.ignore_bits(64).is_ok());
        assert!(bs.ignore_bits(64).is_ok());
        assert!(bs.ignore_bits(32).is_ok());
        assert!(bs.ignore_bits(32).is_ok());
        assert!(bs.ignore_bits(64).is_ok());
        assert!(bs.ignore_bits(1).is_err());
    }

    #[test]
    #[allow(clippy::bool_assert_comparison)]
    fn verify_bitreaderltr_read_bit() {
        let mut bs = BitReaderLtr::new(&[0b1010_1010]);

        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);
        assert_eq!(bs.read_bit().unwrap(), true);
        assert_eq!(bs.read_bit().unwrap(), false);

        // Error test.
        let mut bs = BitReaderLtr::new(&[]);

        assert!(bs.read_bit().is_err());
    }

    #[test]
    fn verify_bitreaderltr_read_bits_leq32() {
        let mut bs = BitReaderLtr::new(&[0b1010_0101, 0b0111_1110, 0b1101_0011]);

        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0b0000_0000_0000_1010);
        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0b0000_0000_0000_0101);
        assert_eq!(bs.read_bits_leq32(13).unwrap(), 0b0000_1111_1101_1010);
        assert_eq!(bs.read_bits_leq32(3).unwrap(), 0b0000_0000_0000_0011);

        // Lower limit test.
        let mut bs = BitReaderLtr::new(&[0xff, 0xff, 0xff, 0xff]);

        assert_eq!(bs.read_bits_leq32(0).unwrap(), 0);

        // Upper limit test.
        let mut bs = BitReaderLtr::new(&[0xff, 0xff, 0xff, 0xff, 0x01]);

        assert_eq!(bs.read_bits_leq32(32).unwrap(), u32::MAX);
        assert_eq!(bs.read_bits_leq32(8).unwrap(), 0x01);

        // Cache boundary test.
        let mut bs = BitReaderLtr::new(&[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, //
            0xf0, 0x00,
        ]);

        assert_eq!(bs.read_bits_leq32(32).unwrap(), 0);
        assert_eq!(bs.read_bits_leq32(24).unwrap(), 0);
        assert_eq!(bs.read_bits_leq32(16).unwrap(), 0x0ff0);
        assert_eq!(bs.read_bits_leq32(8).unwrap(), 0);

        // Error test.
        let mut bs = BitReaderLtr::new(&[0xff]);

        assert!(bs.read_bits_leq32(9).is_err());
    }

    #[test]
    fn verify_bitreaderltr_position() {
        let mut bs = BitReaderLtr::new(&[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11]);

        assert_eq!(bs.bits_left(), 72);

        bs.read_bits_leq32(3).unwrap();
        assert_eq!(bs.bits_read(), 3);

        bs.realign();
        assert_eq!(bs.bits_read(), 8);
        assert_eq!(bs.read_bits_leq32(8).unwrap(), 0x34);

        bs.ignore_bits(50).unwrap();
        assert_eq!(bs.bits_read(), 66);
        assert_eq!(bs.bits_left(), 6);
        assert_eq!(bs.read_bits_leq32(6).unwrap(), 0x11);
    }
}
