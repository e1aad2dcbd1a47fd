// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `util` module provides a repository of commonly used utility functions sorted into
//! distinct categories.

pub mod bits {
    //! Utilities for bit manipulation.

    /// Decodes a "synchsafe" integer: `n` bytes carrying 7 significant bits each, most-significant
    /// byte first. The top bit of every byte is ignored.
    #[inline]
    pub fn synchsafe_to_u32(bytes: &[u8]) -> u32 {
        bytes.iter().fold(0, |acc, &byte| (acc << 7) | u32::from(byte & 0x7f))
    }
}

pub mod clamp {
    //! Functions to clamp a sample into a range.

    /// Converts a sample already scaled to 16-bit full scale into an `i16`, saturating out-of-range
    /// values and truncating the fractional part toward zero.
    #[inline(always)]
    pub fn clamp_pcm_f32_to_i16(val: f32) -> i16 {
        // Float to integer casts saturate. NaN maps to 0.
        val as i16
    }
}
