// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadence_core::checksum::Crc16Ansi;
use cadence_core::errors::Result;
use cadence_core::io::{BitReaderLtr, ReadBitsLtr};

use crate::common::{ChannelMode, FrameHeader, Mode};

use lazy_static::lazy_static;

lazy_static! {
    /// Layer 1 & 2 scale factors, `2^(1 - i/3)`, as per ISO/IEC 11172-3 table B.1.
    pub static ref LAYER12_SCALEFACTORS: [f32; 64] = {
        let mut scalefactors = [0f32; 64];

        for (i, sf) in scalefactors.iter_mut().enumerate() {
            *sf = 2f64.powf(1.0 - i as f64 / 3.0) as f32;
        }

        scalefactors
    };
}

/// Dequantize a raw sample, `raw`, coded with a quantizer of `levels` steps.
///
/// The steps are symmetric about zero and exclude the end-points:
/// `(2 * raw - (levels - 1)) / levels`.
#[inline(always)]
pub fn dequantize(raw: u32, levels: u32) -> f32 {
    (2.0 * raw as f32 - (levels - 1) as f32) / levels as f32
}

/// Gets the first sub-band coded in intensity stereo, or 32 if no sub-bands are.
pub fn intensity_bound(header: &FrameHeader) -> usize {
    match header.channel_mode {
        ChannelMode::JointStereo(Mode::Intensity { bound }) => bound as usize,
        _ => 32,
    }
}

/// Reads `bits` bits covered by the frame CRC.
#[inline(always)]
pub fn read_protected(bs: &mut BitReaderLtr<'_>, crc: &mut Crc16Ansi, bits: u32) -> Result<u32> {
    let value = bs.read_bits_leq32(bits)?;
    crc.process_bits(value, bits);
    Ok(value)
}
