// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Monitor;

/// The CRC-16 ANSI polynomial (x^16 + x^15 + x^2 + 1).
const POLYNOMIAL: u16 = 0x8005;

/// Lookup table for MSB-first CRC-16 with the ANSI polynomial.
const CRC16_ANSI_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            }
            else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// `Crc16Ansi` implements the CRC-16 algorithm using the ANSI polynomial, processing bits from
/// most-significant to least-significant. MPEG audio uses an initial state of `0xffff`.
///
/// In addition to whole bytes, arbitrary bit strings may be processed since MPEG audio frames
/// protect fields that do not end on byte boundaries.
pub struct Crc16Ansi {
    state: u16,
}

impl Crc16Ansi {
    /// Instantiate a `Crc16Ansi` instance with an initial state.
    pub fn new(state: u16) -> Self {
        Crc16Ansi { state }
    }

    /// Returns the computed CRC.
    pub fn crc(&self) -> u16 {
        self.state
    }

    /// Processes the `len` least-significant bits of `value`, most-significant first. `len` must
    /// be 32 or less.
    pub fn process_bits(&mut self, value: u32, len: u32) {
        debug_assert!(len <= 32);

        for i in (0..len).rev() {
            let bit = (value >> i) & 1 != 0;
            let msb = self.state & 0x8000 != 0;

            self.state <<= 1;

            if msb != bit {
                self.state ^= POLYNOMIAL;
            }
        }
    }

    /// Processes the first `len` bits of `buf`, most-significant bit of each byte first.
    pub fn process_buf_bits(&mut self, buf: &[u8], len: usize) {
        debug_assert!(len <= 8 * buf.len());

        let whole = len >> 3;

        self.process_buf_bytes(&buf[..whole]);

        let rem = (len & 0x7) as u32;

        if rem > 0 {
            self.process_bits(u32::from(buf[whole] >> (8 - rem)), rem);
        }
    }
}

impl Monitor for Crc16Ansi {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        let idx = usize::from((self.state >> 8) as u8 ^ byte);
        self.state = (self.state << 8) ^ CRC16_ANSI_TABLE[idx];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.process_byte(byte);
        }
    }
}
