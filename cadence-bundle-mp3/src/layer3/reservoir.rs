// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use cadence_core::io::ReadBitsLtr;

/// The capacity of the bit reservoir in bytes.
pub const RESERVOIR_LEN: usize = 4096;

const RESERVOIR_BITS: u64 = 8 * RESERVOIR_LEN as u64;

#[inline(always)]
fn underrun_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::Other, "bit reservoir underrun"))
}

/// `BitReservoir` is a circular buffer of Layer III main data.
///
/// Main data for a frame may begin in the payload of any of the preceding frames. Each frame
/// appends its payload to the reservoir, and granules are read back through a bit cursor that
/// trails the write cursor. Both cursors are monotonic counters, the physical position in the
/// buffer being the counter modulo the capacity.
pub struct BitReservoir {
    buf: Box<[u8]>,
    /// Total number of bytes written.
    written: u64,
    /// Bit position of the read cursor.
    pos: u64,
}

impl Default for BitReservoir {
    fn default() -> Self {
        BitReservoir { buf: vec![0; RESERVOIR_LEN].into_boxed_slice(), written: 0, pos: 0 }
    }
}

impl BitReservoir {
    /// Appends a byte of main data.
    #[inline(always)]
    pub fn put_byte(&mut self, byte: u8) {
        self.buf[(self.written % RESERVOIR_LEN as u64) as usize] = byte;
        self.written += 1;
    }

    /// Appends a buffer of main data.
    pub fn put_buf(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.put_byte(byte);
        }
    }

    /// Gets the bit position of the read cursor.
    #[inline(always)]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Gets the number of bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Moves the read cursor back by `num_bits`.
    ///
    /// Rewinding past the start of the data still held by the reservoir is a logic error.
    pub fn rewind_bits(&mut self, num_bits: u64) {
        debug_assert!(num_bits <= self.pos);
        self.pos = self.pos.saturating_sub(num_bits);
    }

    /// Moves the read cursor to the absolute bit position `pos`.
    pub fn seek_bits(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.pos {
            self.skip_bits(pos - self.pos)
        }
        else {
            self.rewind_bits(self.pos - pos);
            Ok(())
        }
    }

    /// Moves both cursors back by `num_bytes` without altering the data they address.
    ///
    /// Rebasing by a multiple of the capacity keeps every physical position unchanged, preventing
    /// the counters from growing without bound.
    pub fn rebase(&mut self, num_bytes: u64) {
        debug_assert!(num_bytes % RESERVOIR_LEN as u64 == 0);
        debug_assert!(8 * num_bytes <= self.pos);

        self.written -= num_bytes;
        self.pos -= 8 * num_bytes;
    }

    /// Clears the reservoir.
    pub fn clear(&mut self) {
        self.written = 0;
        self.pos = 0;
    }

    /// Gets the number of bits between the read and write cursors.
    #[inline(always)]
    pub fn bits_left(&self) -> u64 {
        (8 * self.written).saturating_sub(self.pos)
    }

    /// Reads up to 32 bits starting at the read cursor without consuming them. Bits beyond the
    /// write cursor read as 0.
    pub fn peek_bits(&self, num_bits: u32) -> u32 {
        debug_assert!(num_bits <= 32);

        if num_bits == 0 {
            return 0;
        }

        let end = 8 * self.written;

        // Gather the bytes spanning the requested bits into a 64-bit window.
        let mut window = 0u64;

        let byte_pos = self.pos >> 3;

        for i in 0..5 {
            let byte_idx = byte_pos + i;

            let byte = if 8 * byte_idx < end {
                self.buf[(byte_idx % RESERVOIR_LEN as u64) as usize]
            }
            else {
                0
            };

            window = (window << 8) | u64::from(byte);
        }

        // Discard the bits preceding the cursor, then take num_bits.
        let shift = 40 - (self.pos & 0x7) - u64::from(num_bits);
        (window >> shift) as u32 & (u32::MAX >> (32 - num_bits))
    }

    #[inline(always)]
    fn skip_bits(&mut self, num_bits: u64) -> io::Result<()> {
        if num_bits > self.bits_left() {
            return underrun_error();
        }
        self.pos += num_bits;
        Ok(())
    }

    /// Checks that the data under the read cursor has not been overwritten.
    #[inline(always)]
    fn is_stale(&self) -> bool {
        8 * self.written > self.pos + RESERVOIR_BITS
    }
}

impl ReadBitsLtr for BitReservoir {
    #[inline(always)]
    fn read_bits_leq32(&mut self, bit_width: u32) -> io::Result<u32> {
        if u64::from(bit_width) > self.bits_left() || self.is_stale() {
            return underrun_error();
        }

        let value = self.peek_bits(bit_width);
        self.pos += u64::from(bit_width);

        Ok(value)
    }

    #[inline(always)]
    fn ignore_bits(&mut self, num_bits: u32) -> io::Result<()> {
        self.skip_bits(u64::from(num_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_read_and_rewind() {
        let mut res = BitReservoir::default();
        res.put_buf(&[0b1010_0101, 0xff, 0x00, 0x81]);

        assert_eq!(res.read_bits_leq32(3).unwrap(), 0b101);
        assert_eq!(res.tell(), 3);
        assert_eq!(res.read_bits_leq32(9).unwrap(), 0b0_0101_1111);
        assert_eq!(res.tell(), 12);

        res.rewind_bits(12);
        assert_eq!(res.read_bits_leq32(32).unwrap(), 0xa5ff_0081);

        // Nothing is left to read.
        assert!(res.read_bits_leq32(1).is_err());
        assert_eq!(res.tell(), 32);
    }

    #[test]
    fn verify_peek_zero_fills() {
        let mut res = BitReservoir::default();
        res.put_byte(0xff);

        assert_eq!(res.peek_bits(4), 0xf);
        assert_eq!(res.peek_bits(12), 0xff0);
        assert_eq!(res.tell(), 0);

        res.ignore_bits(6).unwrap();
        assert_eq!(res.peek_bits(5), 0b11000);
    }

    #[test]
    fn verify_wraparound() {
        let mut res = BitReservoir::default();

        // Fill the reservoir to 2 bytes before the end and consume it all.
        res.put_buf(&vec![0u8; RESERVOIR_LEN - 2]);
        res.seek_bits(8 * (RESERVOIR_LEN as u64 - 2)).unwrap();

        res.put_buf(&[0x12, 0x34, 0x56, 0x78]);

        assert_eq!(res.read_bits_leq32(32).unwrap(), 0x1234_5678);

        // Rebasing keeps the physical position.
        res.rewind_bits(16);
        res.rebase(RESERVOIR_LEN as u64);
        assert_eq!(res.tell(), 0);
        assert_eq!(res.read_bits_leq32(16).unwrap(), 0x5678);
    }

    #[test]
    fn verify_overwritten_data_is_rejected() {
        let mut res = BitReservoir::default();

        res.put_buf(&vec![0u8; RESERVOIR_LEN + 1]);

        // The first byte was overwritten.
        assert!(res.read_bits_leq32(8).is_err());

        res.seek_bits(8).unwrap();
        assert_eq!(res.read_bits_leq32(8).unwrap(), 0);
    }
}
