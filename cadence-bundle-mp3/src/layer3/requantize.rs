// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::io;

use cadence_core::io::ReadBitsLtr;

use lazy_static::lazy_static;
use log::debug;

use crate::common::*;

use super::bitstream::mixed_long_bands;
use super::huffman::{read_pair, read_quad, PAIR_TABLES};
use super::reservoir::BitReservoir;
use super::{GranuleChannel, ScaleFactors};

lazy_static! {
    /// Lookup table for computing x(i) = s(i)^(4/3) where s(i) is a decoded Huffman sample. The
    /// value of s(i) is bound between 0..8207.
    static ref REQUANTIZE_POW43: [f32; 8207] = {
        let mut pow43 = [0f32; 8207];
        for (i, pow) in pow43.iter_mut().enumerate() {
            *pow = f64::powf(i as f64, 4.0 / 3.0) as f32;
        }
        pow43
    };
}

/// The pre-emphasis table from table B.6 in ISO/IEC 11172-3.
const PRE_EMPHASIS: [u8; 22] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 3, 2, 0];

/// Reads a sign bit and applies it to `value`.
#[inline(always)]
fn read_signed(bs: &mut BitReservoir, value: f32) -> io::Result<f32> {
    Ok(if bs.read_bit()? { -value } else { value })
}

/// Reads the Huffman coded spectral samples for a given channel in a granule from the bit
/// reservoir into a provided sample buffer. Decoding stops at bit position `part3_end`. Returns the
/// number of decoded samples (the starting index of the rzero partition).
///
/// Note, each spectral sample is raised to the (4/3)-rd power. This is not actually part of the
/// Huffman decoding process, but, by converting the integer sample to floating point here we don't
/// need to do pointless casting or use an extra buffer.
pub(super) fn read_huffman_samples(
    bs: &mut BitReservoir,
    channel: &GranuleChannel,
    part3_end: u64,
    buf: &mut [f32; 576],
) -> io::Result<usize> {
    // Dereference the POW43 table once per granule since there is a tiny overhead each time a
    // lazy_static is dereferenced that should be amortized over as many samples as possible.
    let pow43_table: &[f32; 8207] = &REQUANTIZE_POW43;

    let mut i = 0;

    // There are two samples per big_value, therefore multiply big_values by 2 to get number of
    // samples in the big_value partition.
    let big_values_len = 2 * usize::from(channel.big_values);

    // There are up-to 3 regions in the big_value partition. Determine the sample index denoting the
    // end of each region (non-inclusive). Clamp to the end of the big_values partition.
    let regions: [usize; 3] = [
        min(channel.region1_start, big_values_len),
        min(channel.region2_start, big_values_len),
        min(SAMPLES_PER_GRANULE, big_values_len),
    ];

    for (region_idx, &region_end) in regions.iter().enumerate() {
        let table = &PAIR_TABLES[usize::from(channel.table_select[region_idx])];

        // If the table for a region is empty, fill the region with zeros and move on to the next
        // region.
        if table.is_empty() {
            buf[i..region_end.max(i)].fill(0.0);
            i = region_end.max(i);
            continue;
        }

        while i < region_end && bs.tell() < part3_end {
            // Each Huffman code decodes to two samples, x and y, each 4 bits long.
            let (x, y) = read_pair(bs, table)?;

            for (value, sample) in [x, y].into_iter().zip(&mut buf[i..i + 2]) {
                let mut value = value as usize;

                *sample = if value > 0 {
                    // If the value is saturated, and the table specifies linbits, then read
                    // linbits more bits and add it to the value.
                    if value == 15 && table.linbits > 0 {
                        value += bs.read_bits_leq32(table.linbits)? as usize;
                    }

                    read_signed(bs, pow43_table[value])?
                }
                else {
                    0.0
                };
            }

            i += 2;
        }
    }

    let big_values_end = i;

    // Read the count1 partition. Each code decodes to 4 samples: v, w, x, and y. Each sample is
    // 1-bit long (1 or 0). Non-zero samples are followed by a sign bit.
    while i <= SAMPLES_PER_GRANULE - 4 && bs.tell() < part3_end {
        let quad = read_quad(bs, channel.count1table_select)?;

        for (j, sample) in buf[i..i + 4].iter_mut().enumerate() {
            *sample = if quad & (0x8 >> j) != 0 { read_signed(bs, 1.0)? } else { 0.0 };
        }

        i += 4;
    }

    // Some encoders are poor at "stuffing" bits, resulting in part3 being slightly too short for
    // the final quad. The bits decoded past the end of part3 are not a real sample, so erase it.
    // The caller is responsible for re-aligning the bit reservoir.
    if bs.tell() > part3_end && i > big_values_end {
        debug!("mpa: count1 overrun, malformed bitstream");
        i -= 4;
    }

    // The final partition after the count1 partition is the rzero partition. Samples in this
    // partition are all 0.
    buf[i..].fill(0.0);

    Ok(i)
}

/// Requantize the samples of the long scale factor bands `bands[..n_bands]` in `buf`.
fn requantize_long(
    channel: &GranuleChannel,
    sf: &ScaleFactors,
    bands: &[usize],
    n_bands: usize,
    rzero: usize,
    buf: &mut [f32; 576],
) {
    // For long blocks dequantization and scaling is governed by the following equation:
    //
    //                     xr(i) = s(i)^(4/3) * 2^(0.25*A) * 2^(-B)
    // where:
    //       s(i) is the decoded Huffman sample
    //      xr(i) is the dequantized sample
    // and:
    //      A = global_gain[gr] - 210
    //      B = scalefac_multiplier * (scalefacs[gr][ch][sfb] + (preflag[gr] * pretab[sfb]))
    //
    // Note: The samples in buf are the result of s(i)^(4/3) for each sample i.
    let a = i32::from(channel.global_gain) - 210;

    let scalefac_shift = if channel.scalefac_scale { 2 } else { 1 };

    for (i, (&start, &end)) in bands.iter().zip(&bands[1..]).take(n_bands).enumerate() {
        // Do not requantize bands starting after the rzero sample since all samples from there on
        // are 0.
        if start >= rzero {
            break;
        }

        let pre_emphasis = if channel.preflag { PRE_EMPHASIS[i] } else { 0 };

        // Calculate B. The shift multiplies B by 4 so the two powers of 2 combine into one.
        let b = i32::from(sf.long[i] + pre_emphasis) << scalefac_shift;

        let pow2ab = f64::powf(2.0, 0.25 * f64::from(a - b)) as f32;

        for sample in &mut buf[start..min(end, rzero)] {
            *sample *= pow2ab;
        }
    }
}

/// Requantize the samples of the short scale factor bands starting at band `first_sfb` in `buf`.
fn requantize_short(
    channel: &GranuleChannel,
    sf: &ScaleFactors,
    bands: &[usize; 40],
    first_sfb: usize,
    rzero: usize,
    buf: &mut [f32; 576],
) {
    // For short blocks dequantization and scaling is governed by the following equation:
    //
    //                     xr(i) = s(i)^(4/3) * 2^(0.25*A) * 2^(-B)
    // where:
    //       s(i) is the decoded Huffman sample
    //      xr(i) is the dequantized sample
    // and:
    //      A = global_gain[gr] - 210 - (8 * subblock_gain[gr][win])
    //      B = scalefac_multiplier * scalefacs[gr][ch][sfb][win]
    let gain = i32::from(channel.global_gain) - 210;

    let a = [
        gain - 8 * i32::from(channel.subblock_gain[0]),
        gain - 8 * i32::from(channel.subblock_gain[1]),
        gain - 8 * i32::from(channel.subblock_gain[2]),
    ];

    let scalefac_shift = if channel.scalefac_scale { 2 } else { 1 };

    // Entry 3 * sfb + win of the band table is the start of window win of band sfb.
    for j in 3 * first_sfb..39 {
        let (start, end) = (bands[j], bands[j + 1]);

        if start >= rzero {
            break;
        }

        let (sfb, win) = (j / 3, j % 3);

        let b = i32::from(sf.short[win][sfb]) << scalefac_shift;

        let pow2ab = f64::powf(2.0, 0.25 * f64::from(a[win] - b)) as f32;

        for sample in &mut buf[start..min(end, rzero)] {
            *sample *= pow2ab;
        }
    }
}

/// Requantize samples in `buf` regardless of block type.
pub(super) fn requantize(
    header: &FrameHeader,
    channel: &GranuleChannel,
    sf: &ScaleFactors,
    buf: &mut [f32; 576],
) {
    let sr = header.sample_rate_idx;

    match channel.block_type {
        BlockType::Short { is_mixed: false } => {
            requantize_short(channel, sf, &SFB_SHORT_BANDS[sr], 0, channel.rzero, buf);
        }
        BlockType::Short { is_mixed: true } => {
            // A mixed block is a combination of a long block and short blocks. The first few scale
            // factor bands belong to a single long block, while the remaining bands belong to short
            // blocks.
            let n_long = mixed_long_bands(header);

            requantize_long(channel, sf, &SFB_LONG_BANDS[sr], n_long, channel.rzero, buf);
            requantize_short(
                channel,
                sf,
                &SFB_SHORT_BANDS[sr],
                MIXED_FIRST_SHORT_BAND,
                channel.rzero,
                buf,
            );
        }
        _ => {
            requantize_long(channel, sf, &SFB_LONG_BANDS[sr], 22, channel.rzero, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_frame_header;

    fn reservoir(bytes: &[u8]) -> BitReservoir {
        let mut bs = BitReservoir::default();
        bs.put_buf(bytes);
        bs
    }

    #[test]
    fn verify_big_values_and_count1() {
        // One big_values pair with table 1, (1, 0) = 01 followed by a positive sign bit, then a
        // count1 quad with table B, 0101 = 1010 followed by a negative and positive sign bit.
        let channel = GranuleChannel {
            big_values: 1,
            table_select: [1, 1, 1],
            region1_start: 576,
            region2_start: 576,
            count1table_select: true,
            ..Default::default()
        };

        let mut bs = reservoir(&[0b0101_0101, 0b0000_0000]);
        let mut buf = [7.0f32; 576];

        let rzero = read_huffman_samples(&mut bs, &channel, 9, &mut buf).unwrap();

        assert_eq!(rzero, 6);
        assert_eq!(&buf[..6], &[1.0, 0.0, 0.0, -1.0, 0.0, 1.0]);
        assert!(buf[6..].iter().all(|&s| s == 0.0));
        assert_eq!(bs.tell(), 9);
    }

    #[test]
    fn verify_linbits() {
        // Table 16 (linbits = 1): (15, 0) is coded as 000001100, followed by the linbits and sign.
        let channel = GranuleChannel {
            big_values: 1,
            table_select: [16, 16, 16],
            region1_start: 576,
            region2_start: 576,
            ..Default::default()
        };

        let mut bs = reservoir(&[0b0000_0110, 0b0110_0000]);
        let mut buf = [0f32; 576];

        let rzero = read_huffman_samples(&mut bs, &channel, 11, &mut buf).unwrap();

        assert_eq!(rzero, 2);
        assert!((buf[0] + f32::powf(16.0, 4.0 / 3.0)).abs() < 1e-3);
        assert_eq!(buf[1], 0.0);
    }

    #[test]
    fn verify_count1_overrun_is_dropped() {
        let channel = GranuleChannel { count1table_select: true, ..Default::default() };

        // Two table B quads of 4 bits each (all zero values), but part3 is only 6 bits long.
        let mut bs = reservoir(&[0xff, 0xff]);
        let mut buf = [0f32; 576];

        let rzero = read_huffman_samples(&mut bs, &channel, 6, &mut buf).unwrap();

        assert_eq!(rzero, 4);
        assert_eq!(bs.tell(), 8);
    }

    #[test]
    fn verify_requantize_long() {
        let header = parse_frame_header(0xfffb_9064).unwrap();

        let channel = GranuleChannel {
            global_gain: 210,
            scalefac_scale: true,
            preflag: true,
            rzero: 576,
            ..Default::default()
        };

        let mut sf = ScaleFactors::default();
        sf.long[0] = 1;

        let mut buf = [1.0f32; 576];
        requantize(&header, &channel, &sf, &mut buf);

        // Band 0: 2^(0.25 * -(1 << 2)) = 0.5.
        assert!((buf[0] - 0.5).abs() < 1e-6);
        // Band 1 is unscaled.
        assert!((buf[4] - 1.0).abs() < 1e-6);
        // Band 11 is pre-emphasized by 1.
        assert!((buf[SFB_LONG_BANDS[0][11]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn verify_requantize_short_subblock_gain() {
        let header = parse_frame_header(0xfffb_9064).unwrap();

        let channel = GranuleChannel {
            global_gain: 214,
            block_type: BlockType::Short { is_mixed: false },
            subblock_gain: [0, 1, 0],
            rzero: 576,
            ..Default::default()
        };

        let mut buf = [1.0f32; 576];
        requantize(&header, &channel, &ScaleFactors::default(), &mut buf);

        // Window 0 of band 0 has a gain of 2^(0.25 * 4) = 2, window 1 has 2^(0.25 * -4) = 0.5.
        assert!((buf[0] - 2.0).abs() < 1e-6);
        assert!((buf[4] - 0.5).abs() < 1e-6);
        assert!((buf[8] - 2.0).abs() < 1e-6);
    }
}
