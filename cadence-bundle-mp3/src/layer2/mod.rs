// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use cadence_core::checksum::Crc16Ansi;
use cadence_core::errors::Result;
use cadence_core::io::{BitReaderLtr, BufReader, ReadBitsLtr, ReadBytes};

use crate::common::*;
use crate::layer12::{dequantize, intensity_bound, read_protected};
use crate::layer12::LAYER12_SCALEFACTORS;
use crate::reader::Frame;
use crate::synthesis;

/// Number of samples per sub-band in a layer 2 frame.
const SAMPLES_PER_SUBBAND: usize = 36;

/// A layer 2 quantizer class.
struct Quantizer {
    /// The number of quantization steps.
    levels: u32,
    /// Three consecutive samples are coded as one codeword.
    grouped: bool,
    /// The number of bits per codeword.
    bits: u32,
}

/// Quantizer classes as per ISO/IEC 11172-3 table B.4.
#[rustfmt::skip]
const QUANTIZERS: [Quantizer; 17] = [
    Quantizer { levels:     3, grouped: true,  bits:  5 },
    Quantizer { levels:     5, grouped: true,  bits:  7 },
    Quantizer { levels:     7, grouped: false, bits:  3 },
    Quantizer { levels:     9, grouped: true,  bits: 10 },
    Quantizer { levels:    15, grouped: false, bits:  4 },
    Quantizer { levels:    31, grouped: false, bits:  5 },
    Quantizer { levels:    63, grouped: false, bits:  6 },
    Quantizer { levels:   127, grouped: false, bits:  7 },
    Quantizer { levels:   255, grouped: false, bits:  8 },
    Quantizer { levels:   511, grouped: false, bits:  9 },
    Quantizer { levels:  1023, grouped: false, bits: 10 },
    Quantizer { levels:  2047, grouped: false, bits: 11 },
    Quantizer { levels:  4095, grouped: false, bits: 12 },
    Quantizer { levels:  8191, grouped: false, bits: 13 },
    Quantizer { levels: 16383, grouped: false, bits: 14 },
    Quantizer { levels: 32767, grouped: false, bits: 15 },
    Quantizer { levels: 65535, grouped: false, bits: 16 },
];

/// Selects the allocation table class for MPEG1 streams from the bit-rate index (less 1). The
/// first row is for single channel streams, the second for two channel streams where the index
/// selects the bit-rate per channel.
#[rustfmt::skip]
const ALLOC_CLASS: [[usize; 14]; 2] = [
    [0, 0, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    [0, 0, 0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 2, 2],
];

const TABLE_LOW_RATE: u8 = 0 << 6;
const TABLE_HIGH_RATE: u8 = 1 << 6;

/// The allocation table and sub-band limit for each allocation table class (row) and MPEG1 sample
/// rate (column: 44.1, 48, 32 kHz). The upper bits select the table, the lower 6 bits the limit.
#[rustfmt::skip]
const ALLOC_TABLE: [[u8; 3]; 3] = [
    [TABLE_LOW_RATE | 8, TABLE_LOW_RATE | 8, TABLE_LOW_RATE | 12],
    [TABLE_HIGH_RATE | 27, TABLE_HIGH_RATE | 27, TABLE_HIGH_RATE | 27],
    [TABLE_HIGH_RATE | 30, TABLE_HIGH_RATE | 27, TABLE_HIGH_RATE | 30],
];

/// Per sub-band allocation field descriptor for each allocation table: the upper nibble is the
/// number of allocation bits, the lower nibble selects the row of `ALLOC_QUANTIZERS`.
#[rustfmt::skip]
const ALLOC_FIELDS: [[u8; 30]; 3] = [
    // ISO/IEC 11172-3 tables B.2c and B.2d.
    [
        0x44, 0x44, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ],
    // ISO/IEC 11172-3 tables B.2a and B.2b.
    [
        0x43, 0x43, 0x43, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x31, 0x31, 0x31, 0x31,
        0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    ],
    // ISO/IEC 13818-3 table B.1.
    [
        0x45, 0x45, 0x45, 0x45, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x24, 0x24, 0x24, 0x24,
        0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
    ],
];

/// Maps an allocation value to a quantizer class (plus 1), or 0 if the sub-band is not coded.
#[rustfmt::skip]
const ALLOC_QUANTIZERS: [[u8; 16]; 6] = [
    [0, 1, 2, 17, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 2, 3, 4, 5, 6, 17, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 17],
    [0, 1, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17],
    [0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 17],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
];

/// Gets the allocation table and the number of coded sub-bands for a frame.
fn select_alloc_table(header: &FrameHeader) -> (usize, usize) {
    if !header.is_mpeg1() {
        return (2, 30);
    }

    let class = ALLOC_CLASS[min(header.n_channels(), 2) - 1][header.bitrate_idx as usize - 1];
    let entry = ALLOC_TABLE[class][header.sample_rate_idx];

    (usize::from(entry >> 6), usize::from(entry & 0x3f))
}

/// Reads the bit allocation of a sub-band and returns its quantizer, if coded.
fn read_allocation(
    bs: &mut BitReaderLtr<'_>,
    crc: &mut Crc16Ansi,
    table: usize,
    sb: usize,
) -> Result<Option<&'static Quantizer>> {
    let field = ALLOC_FIELDS[table][sb];

    let value = read_protected(bs, crc, u32::from(field >> 4))?;

    let class = ALLOC_QUANTIZERS[usize::from(field & 0xf)][value as usize];

    Ok(match class {
        0 => None,
        _ => Some(&QUANTIZERS[usize::from(class) - 1]),
    })
}

/// Reads and dequantizes, without scaling, the 3 consecutive samples of a sub-band.
fn read_samples(bs: &mut BitReaderLtr<'_>, quant: &Quantizer, out: &mut [f32; 3]) -> Result<()> {
    if quant.grouped {
        let mut code = bs.read_bits_leq32(quant.bits)?;

        for sample in out.iter_mut() {
            *sample = dequantize(code % quant.levels, quant.levels);
            code /= quant.levels;
        }
    }
    else {
        for sample in out.iter_mut() {
            *sample = dequantize(bs.read_bits_leq32(quant.bits)?, quant.levels);
        }
    }

    Ok(())
}

/// Reads the three scalefactors of a sub-band given its scalefactor selection information.
fn read_scalefactors(bs: &mut BitReaderLtr<'_>, scfsi: u32) -> Result<[f32; 3]> {
    let mut read = || -> Result<f32> { Ok(LAYER12_SCALEFACTORS[bs.read_bits_leq32(6)? as usize]) };

    let scalefactors = match scfsi {
        // Three scalefactors.
        0 => [read()?, read()?, read()?],
        // The first scalefactor is shared by the first two parts.
        1 => {
            let a = read()?;
            [a, a, read()?]
        }
        // One scalefactor for all parts.
        2 => {
            let a = read()?;
            [a, a, a]
        }
        // The second scalefactor is shared by the last two parts.
        _ => {
            let a = read()?;
            let b = read()?;
            [a, b, b]
        }
    };

    Ok(scalefactors)
}

/// Reads and dequantizes the sub-band samples of a frame into `samples`, where
/// `samples[ch][36 * sb + 12 * part + 3 * gr + i]` is sample `i` of granule `gr` in part `part` of
/// sub-band `sb`.
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

    let num_channels = header.n_channels();

    let (table, sblimit) = select_alloc_table(header);
    let bound = min(intensity_bound(header), sblimit);

    let mut alloc: [[Option<&Quantizer>; 32]; 2] = [[None; 32]; 2];

    // Bit allocations of the non-intensity coded sub-bands.
    for sb in 0..bound {
        for ch in 0..num_channels {
            alloc[ch][sb] = read_allocation(&mut bs, &mut crc, table, sb)?;
        }
    }

    // Bit allocations of the intensity coded sub-bands.
    for sb in bound..sblimit {
        let quant = read_allocation(&mut bs, &mut crc, table, sb)?;

        alloc[0][sb] = quant;
        alloc[1][sb] = quant;
    }

    // Scalefactor selection information.
    let mut scfsi = [[0u32; 32]; 2];

    for sb in 0..sblimit {
        for ch in 0..num_channels {
            if alloc[ch][sb].is_some() {
                scfsi[ch][sb] = read_protected(&mut bs, &mut crc, 2)?;
            }
        }
    }

    let mut status = FrameStatus::default();

    if let Some(stored_crc) = stored_crc {
        status.crc_mismatch = check_crc(stored_crc, &crc, verify_crc)?;
    }

    // Scalefactors for each of the 3 parts of the frame.
    let mut scalefacs = [[[0f32; 3]; 32]; 2];

    for sb in 0..sblimit {
        for ch in 0..num_channels {
            if alloc[ch][sb].is_some() {
                scalefacs[ch][sb] = read_scalefactors(&mut bs, scfsi[ch][sb])?;
            }
        }
    }

    // Each part consists of 4 granules of 3 samples per sub-band.
    let mut triple = [0f32; 3];

    for part in 0..3 {
        for gr in 0..4 {
            let s = 12 * part + 3 * gr;

            for sb in 0..bound {
                for ch in 0..num_channels {
                    if let Some(quant) = alloc[ch][sb] {
                        read_samples(&mut bs, quant, &mut triple)?;

                        let sf = scalefacs[ch][sb][part];
                        let start = SAMPLES_PER_SUBBAND * sb + s;

                        for (o, t) in samples[ch][start..start + 3].iter_mut().zip(&triple) {
                            *o = sf * t;
                        }
                    }
                }
            }

            // Intensity coded sub-bands share the samples, but not the scalefactors.
            for sb in bound..sblimit {
                if let Some(quant) = alloc[0][sb] {
                    read_samples(&mut bs, quant, &mut triple)?;

                    let start = SAMPLES_PER_SUBBAND * sb + s;

                    for ch in 0..num_channels {
                        let sf = scalefacs[ch][sb][part];

                        for (o, t) in samples[ch][start..start + 3].iter_mut().zip(&triple) {
                            *o = sf * t;
                        }
                    }
                }
            }
        }
    }

    Ok(status)
}

pub struct Layer2 {
    pub synthesis: [synthesis::SynthesisState; 2],
}

impl Layer2 {
    pub fn new() -> Self {
        Self { synthesis: Default::default() }
    }
}

impl Default for Layer2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Layer2 {
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
