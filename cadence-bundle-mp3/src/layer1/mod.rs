// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadence_core::errors::{decode_error, Result};
use cadence_core::io::{BitReaderLtr, BufReader, ReadBitsLtr, ReadBytes};

use crate::common::*;
use crate::layer12::{dequantize, intensity_bound, read_protected};
use crate::layer12::LAYER12_SCALEFACTORS;
use crate::reader::Frame;
use crate::synthesis;

/// Number of samples per sub-band in a layer 1 frame.
const SAMPLES_PER_SUBBAND: usize = 12;

/// Reads a 4-bit bit allocation and returns the number of bits per sample, or 0 if the sub-band is
/// not coded.
fn read_allocation(bits: u32) -> Result<u32> {
    match bits {
        0 => Ok(0),
        0xf => decode_error("mpa: invalid layer 1 bit allocation"),
        _ => Ok(bits + 1),
    }
}

pub struct Layer1 {
    pub synthesis: [synthesis::SynthesisState; 2],
}

impl Layer1 {
    pub fn new() -> Self {
        Self { synthesis: Default::default() }
    }
}

impl Default for Layer1 {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and dequantizes the sub-band samples of a frame into `samples`, where
/// `samples[ch][12 * sb + s]` is sample `s` of sub-band `sb`.
fn read_subband_samples(
    frame: &Frame<'_>,
    verify_crc: bool,
    samples: &mut [[f32; 32 * SAMPLES_PER_SUBBAND]; 2],
) -> Result<FrameStatus> {
    let header = &frame.header;

    let mut reader = BufReader::new(frame.data);

    let stored_crc = if header.has_crc { Some(reader.read_be_u16()?) } else { None };

    let mut bs = BitReaderLtr::new(reader.read_buf_bytes_available_ref());
    let mut crc = header_crc(frame.header_word);

    let mut alloc = [[0u32; 32]; 2];
    let mut scalefacs = [[0.0; 32]; 2];

    let num_channels = header.n_channels();
    let bound = intensity_bound(header);

    // Read bit allocations for each non-intensity coded sub-band.
    for sb in 0..bound {
        for ch in 0..num_channels {
            alloc[ch][sb] = read_allocation(read_protected(&mut bs, &mut crc, 4)?)?;
        }
    }

    // Read bit allocations for the intensity coded sub-bands. Both channels share them.
    for sb in bound..32 {
        let bits = read_allocation(read_protected(&mut bs, &mut crc, 4)?)?;

        alloc[0][sb] = bits;
        alloc[1][sb] = bits;
    }

    let mut status = FrameStatus::default();

    if let Some(stored_crc) = stored_crc {
        status.crc_mismatch = check_crc(stored_crc, &crc, verify_crc)?;
    }

    // Read scalefactors for each sub-band.
    for sb in 0..32 {
        for ch in 0..num_channels {
            if alloc[ch][sb] != 0 {
                let index = bs.read_bits_leq32(6)? as usize;

                scalefacs[ch][sb] = LAYER12_SCALEFACTORS[index];
            }
        }
    }

    for s in 0..SAMPLES_PER_SUBBAND {
        // Non-intensity coded sub-bands.
        for sb in 0..bound {
            for ch in 0..num_channels {
                let bits = alloc[ch][sb];

                if bits != 0 {
                    let raw = bs.read_bits_leq32(bits)?;

                    let sample = dequantize(raw, (1 << bits) - 1);

                    samples[ch][SAMPLES_PER_SUBBAND * sb + s] = scalefacs[ch][sb] * sample;
                }
            }
        }

        // Intensity coded sub-bands.
        for sb in bound..32 {
            let bits = alloc[0][sb];

            if bits != 0 {
                let raw = bs.read_bits_leq32(bits)?;

                let sample = dequantize(raw, (1 << bits) - 1);

                // Unscale the sample into both channels.
                for ch in 0..num_channels {
                    samples[ch][SAMPLES_PER_SUBBAND * sb + s] = scalefacs[ch][sb] * sample;
                }
            }
        }
    }

    Ok(status)
}

impl Layer for Layer1 {
    fn decode(&mut self, frame: &Frame<'_>, ctx: &mut DecodeContext<'_>) -> Result<FrameStatus> {
        let mut samples = [[0f32; 32 * SAMPLES_PER_SUBBAND]; 2];

        let status = read_subband_samples(frame, ctx.verify_crc, &mut samples)?;

        synthesis::synthesis_channels(
            &mut self.synthesis,
            SAMPLES_PER_SUBBAND,
            [&samples[0], &samples[1]],
            frame.header.n_channels(),
            ctx,
        );

        Ok(status)
    }

    fn reset(&mut self) {
        for state in self.synthesis.iter_mut() {
            state.reset();
        }
    }
}
