// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadence_core::errors::{decode_error, Result};
use cadence_core::io::ReadBitsLtr;

use crate::common::*;

use super::{FrameData, GranuleChannel, ScaleFactors};

/// Pairs of bit lengths for MPEG version 1 scale factors. For MPEG version 1, there are two
/// possible bit lengths for scale factors: slen1 and slen2. The first N of bands have scale factors
/// of bit length slen1, while the remaining bands have length slen2. The value of the switch point,
/// N, is determined by block type.
///
/// This table is indexed by scalefac_compress.
const SCALE_FACTOR_SLEN: [(u32, u32); 16] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (0, 3),
    (3, 0),
    (1, 1),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 2),
    (2, 3),
    (3, 1),
    (3, 2),
    (3, 3),
    (4, 2),
    (4, 3),
];

/// For MPEG version 2, each scale factor band has a different scale factor. The length in bits of
/// a scale factor (slen) can be one of 4 values. The values in this table indicate the number of
/// scale factors that have length slen[0..4]. Slen[0..4] is calculated from scalefac_compress.
///
/// This table is indexed by channel_mode, scalefac_compress, and block_type.
const SCALE_FACTOR_MPEG2_NSFB: [[[usize; 4]; 3]; 6] = [
    // Intensity stereo channel modes.
    [[7, 7, 7, 0], [12, 12, 12, 0], [6, 15, 12, 0]],
    [[6, 6, 6, 3], [12, 9, 9, 6], [6, 12, 9, 6]],
    [[8, 8, 5, 0], [15, 12, 9, 0], [6, 18, 9, 0]],
    // Other channel modes.
    [[6, 5, 5, 5], [9, 9, 9, 9], [6, 9, 9, 9]],
    [[6, 5, 7, 3], [9, 9, 12, 6], [6, 9, 12, 6]],
    [[11, 10, 0, 0], [18, 18, 0, 0], [15, 18, 0, 0]],
];

/// Gets the number of long scale factor bands at the start of a mixed block.
#[inline(always)]
pub(super) fn mixed_long_bands(header: &FrameHeader) -> usize {
    if header.is_mpeg1() {
        8
    }
    else {
        6
    }
}

/// Reads the side_info for a single channel in a granule.
fn read_granule_channel_side_info<B: ReadBitsLtr>(
    bs: &mut B,
    channel: &mut GranuleChannel,
    header: &FrameHeader,
) -> Result<()> {
    channel.part2_3_length = bs.read_bits_leq32(12)? as u16;
    channel.big_values = bs.read_bits_leq32(9)? as u16;

    // The maximum number of samples in a granule is 576. One big_value decodes to 2 samples,
    // therefore there can be no more than 288 (576/2) big_values.
    if channel.big_values > 288 {
        return decode_error("mpa: granule big_values > 288");
    }

    channel.global_gain = bs.read_bits_leq32(8)? as u8;

    channel.scalefac_compress =
        if header.is_mpeg1() { bs.read_bits_leq32(4) } else { bs.read_bits_leq32(9) }? as u16;

    let window_switching = bs.read_bit()?;

    if window_switching {
        let block_type_enc = bs.read_bits_leq32(2)?;

        let is_mixed = bs.read_bit()?;

        channel.block_type = match block_type_enc {
            // Only transitional Long blocks (Start, End) are allowed with window switching.
            0b01 => BlockType::Start,
            0b10 => BlockType::Short { is_mixed },
            0b11 => BlockType::End,
            _ => return decode_error("mpa: invalid block_type"),
        };

        // When window switching is used, there are only two regions, therefore there are only
        // two table selectors.
        channel.table_select[0] = bs.read_bits_leq32(5)? as u8;
        channel.table_select[1] = bs.read_bits_leq32(5)? as u8;
        channel.table_select[2] = 0;

        for gain in channel.subblock_gain.iter_mut() {
            *gain = bs.read_bits_leq32(3)? as u8;
        }

        // When using window switching, the boundaries of region[0..3] are set implicitly according
        // to the MPEG version and block type.
        channel.region1_start = if header.is_mpeg2p5() {
            // For MPEG2.5, the number of scale-factor bands in region0 depends on the block type.
            let region0_count = match channel.block_type {
                BlockType::Short { is_mixed: false } => 5 + 1,
                _ => 7 + 1,
            };

            SFB_LONG_BANDS[header.sample_rate_idx][region0_count]
        }
        else if header.is_mpeg1() || block_type_enc == 0b10 {
            // Region0 spans the first 8 long bands, or the first 9 short bands (3 windows each). In
            // both cases, these bands sum to 36 samples.
            36
        }
        else {
            // MPEG2 transitional long blocks: the first 8 long bands sum to 54 samples.
            54
        };

        // The second region, region1, spans the remaining samples. Therefore the third region,
        // region2, isn't used.
        channel.region2_start = SAMPLES_PER_GRANULE;
    }
    else {
        // If window switching is not used, the block type is always Long.
        channel.block_type = BlockType::Long;

        for select in channel.table_select.iter_mut() {
            *select = bs.read_bits_leq32(5)? as u8;
        }

        // The number of bands in region0 and region1 are stored as 1 less than the actual value.
        let region0_count = bs.read_bits_leq32(4)? as usize + 1;
        let region0_1_count = bs.read_bits_leq32(3)? as usize + region0_count + 1;

        channel.region1_start = SFB_LONG_BANDS[header.sample_rate_idx][region0_count];

        // The count in region0_1_count may exceed the last band (22) in the long bands table.
        channel.region2_start = match region0_1_count {
            0..=22 => SFB_LONG_BANDS[header.sample_rate_idx][region0_1_count],
            _ => SAMPLES_PER_GRANULE,
        };
    }

    // For LSF, preflag is determined implicitly when reading the scale factors.
    channel.preflag = if header.is_mpeg1() { bs.read_bit()? } else { false };

    channel.scalefac_scale = bs.read_bit()?;
    channel.count1table_select = bs.read_bit()?;

    Ok(())
}

/// Reads the side_info of a Layer III frame into `FrameData`. Returns the length of the side_info
/// in bytes.
pub(super) fn read_side_info<B: ReadBitsLtr>(
    bs: &mut B,
    header: &FrameHeader,
    frame_data: &mut FrameData,
) -> Result<usize> {
    if header.is_mpeg1() {
        // First 9 bits is main_data_begin.
        frame_data.main_data_begin = bs.read_bits_leq32(9)? as u16;

        // Next 3 (>1 channel) or 5 (1 channel) bits are private and should be ignored.
        match header.channel_mode {
            ChannelMode::Mono => bs.ignore_bits(5)?,
            _ => bs.ignore_bits(3)?,
        };

        // Next four (or 8, if more than one channel) are the SCFSI bits.
        for scfsi in &mut frame_data.scfsi[..header.n_channels()] {
            for band in scfsi.iter_mut() {
                *band = bs.read_bit()?;
            }
        }
    }
    else {
        // First 8 bits is main_data_begin.
        frame_data.main_data_begin = bs.read_bits_leq32(8)? as u16;

        // Next 1 (1 channel) or 2 (>1 channel) bits are private and should be ignored.
        match header.channel_mode {
            ChannelMode::Mono => bs.ignore_bits(1)?,
            _ => bs.ignore_bits(2)?,
        }
    }

    for granule in &mut frame_data.granules[..header.n_granules()] {
        for channel in &mut granule.channels[..header.n_channels()] {
            read_granule_channel_side_info(bs, channel, header)?;
        }
    }

    Ok(header.side_info_len())
}

/// Reads `n` scale factors of `slen` bits each into `out`. Scale factors coded with 0 bits are 0.
#[inline(always)]
fn read_slen<B: ReadBitsLtr>(bs: &mut B, slen: u32, out: &mut [u8]) -> Result<u32> {
    if slen == 0 {
        out.fill(0);
        return Ok(0);
    }

    for sf in out.iter_mut() {
        *sf = bs.read_bits_leq32(slen)? as u8;
    }

    Ok(slen * out.len() as u32)
}

/// Reads short window scale factors for bands `sfbs`, each band coding 3 windows.
fn read_short_slen<B: ReadBitsLtr>(
    bs: &mut B,
    slen: u32,
    sfbs: std::ops::Range<usize>,
    sf: &mut ScaleFactors,
) -> Result<u32> {
    let mut bits_read = 0;

    for sfb in sfbs {
        for win in 0..3 {
            bits_read += read_slen(bs, slen, &mut sf.short[win][sfb..sfb + 1])?;
        }
    }

    Ok(bits_read)
}

/// Reads the scale factors for a single channel in a granule of a MPEG version 1 frame. Returns the
/// number of bits read (the part2 length).
pub(super) fn read_scale_factors_mpeg1<B: ReadBitsLtr>(
    bs: &mut B,
    gr: usize,
    ch: usize,
    frame_data: &FrameData,
    sf: &mut ScaleFactors,
) -> Result<u32> {
    let mut bits_read = 0;

    let channel = &frame_data.granules[gr].channels[ch];

    // For MPEG1, scalefac_compress is a 4-bit index into a scale factor bit length lookup table.
    let (slen1, slen2) = SCALE_FACTOR_SLEN[usize::from(channel.scalefac_compress)];

    if let BlockType::Short { is_mixed } = channel.block_type {
        // A mixed block starts with long bands 0..8 coded with slen1, followed by short bands
        // 3..6 also coded with slen1. A pure short block codes short bands 0..6 with slen1. In
        // both cases, short bands 6..12 are coded with slen2.
        let first_short = if is_mixed {
            bits_read += read_slen(bs, slen1, &mut sf.long[..8])?;
            MIXED_FIRST_SHORT_BAND
        }
        else {
            0
        };

        bits_read += read_short_slen(bs, slen1, first_short..6, sf)?;
        bits_read += read_short_slen(bs, slen2, 6..12, sf)?;

        // The last short band has no scale factor.
        for window in sf.short.iter_mut() {
            window[12] = 0;
        }
    }
    else {
        // For normal windows there are 21 scale factor bands. These bands are divivided into four
        // band ranges. Scale factors in the first two band ranges: [0..6], [6..11], have scale
        // factors that are slen1 bits long, while the last two band ranges: [11..16], [16..21] have
        // scale factors that are slen2 bits long.
        const SCALE_FACTOR_BANDS: [(usize, usize); 4] = [(0, 6), (6, 11), (11, 16), (16, 21)];

        for (i, &(start, end)) in SCALE_FACTOR_BANDS.iter().enumerate() {
            let slen = if i < 2 { slen1 } else { slen2 };

            // In the second granule, the scale factor selection information may indicate that the
            // scale factors of the first granule, still held in `sf`, are reused.
            if gr == 0 || !frame_data.scfsi[ch][i] {
                bits_read += read_slen(bs, slen, &mut sf.long[start..end])?;
            }
        }

        sf.long[21] = 0;
        sf.long[22] = 0;
    }

    Ok(bits_read)
}

/// Reads the scale factors for a single channel in a granule of a LSF (MPEG version 2 or 2.5)
/// frame. Returns the number of bits read (the part2 length).
pub(super) fn read_scale_factors_lsf<B: ReadBitsLtr>(
    bs: &mut B,
    is_intensity_stereo: bool,
    channel: &mut GranuleChannel,
    sf: &mut ScaleFactors,
) -> Result<u32> {
    let block_index = match channel.block_type {
        BlockType::Short { is_mixed: true } => 2,
        BlockType::Short { is_mixed: false } => 1,
        _ => 0,
    };

    let (slen_table, nsfb_table) = if is_intensity_stereo {
        // The actual value of scalefac_compress is a 9-bit unsigned integer (0..512) for MPEG2. A
        // right shift reduces it to an 8-bit value (0..256).
        let sfc = u32::from(channel.scalefac_compress) >> 1;

        match sfc {
            0..=179 => (
                [
                    (sfc / 36),     //
                    (sfc % 36) / 6, //
                    (sfc % 36) % 6, //
                    0,              //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[0][block_index],
            ),
            180..=243 => (
                [
                    ((sfc - 180) % 64) >> 4, //
                    ((sfc - 180) % 16) >> 2, //
                    ((sfc - 180) % 4),       //
                    0,                       //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[1][block_index],
            ),
            _ => (
                [
                    (sfc - 244) / 3, //
                    (sfc - 244) % 3, //
                    0,               //
                    0,               //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[2][block_index],
            ),
        }
    }
    else {
        let sfc = u32::from(channel.scalefac_compress);

        // Preflag is set only if scalefac_compress >= 500 and this is not the intensity stereo
        // channel. See ISO/IEC 13818-3 section 2.4.3.4.
        channel.preflag = sfc >= 500;

        match sfc {
            0..=399 => (
                [
                    (sfc >> 4) / 5,  //
                    (sfc >> 4) % 5,  //
                    (sfc % 16) >> 2, //
                    (sfc % 4),       //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[3][block_index],
            ),
            400..=499 => (
                [
                    ((sfc - 400) >> 2) / 5, //
                    ((sfc - 400) >> 2) % 5, //
                    (sfc - 400) % 4,        //
                    0,                      //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[4][block_index],
            ),
            _ => (
                [
                    (sfc - 500) / 3, //
                    (sfc - 500) % 3, //
                    0,               //
                    0,               //
                ],
                &SCALE_FACTOR_MPEG2_NSFB[5][block_index],
            ),
        }
    };

    // Read all the scale factors into a flat buffer in bitstream order, along with the largest
    // value each could be coded with.
    let mut flat = [0u8; 39];
    let mut flat_max = [0u8; 39];
    let mut bits_read = 0;
    let mut start = 0;

    for (&slen, &n_sfb) in slen_table.iter().zip(nsfb_table.iter()) {
        bits_read += read_slen(bs, slen, &mut flat[start..start + n_sfb])?;
        flat_max[start..start + n_sfb].fill(((1u32 << slen) - 1) as u8);
        start += n_sfb;
    }

    // Unpack the flat buffers. Short bands are stored band by band with the 3 windows of a band
    // stored consecutively.
    *sf = Default::default();

    match channel.block_type {
        BlockType::Short { is_mixed } => {
            let (n_long, first_short) = if is_mixed { (6, MIXED_FIRST_SHORT_BAND) } else { (0, 0) };

            sf.long[..n_long].copy_from_slice(&flat[..n_long]);
            sf.long_is_max[..n_long].copy_from_slice(&flat_max[..n_long]);

            for i in 0..start - n_long {
                sf.short[i % 3][first_short + i / 3] = flat[n_long + i];
                sf.short_is_max[i % 3][first_short + i / 3] = flat_max[n_long + i];
            }
        }
        _ => {
            sf.long[..start].copy_from_slice(&flat[..start]);
            sf.long_is_max[..start].copy_from_slice(&flat_max[..start]);
        }
    }

    Ok(bits_read)
}

#[cfg(test)]
mod tests {
    use cadence_core::io::BitReaderLtr;

    use super::*;
    use crate::header::parse_frame_header;

    #[test]
    fn verify_side_info_mono_long() {
        // MPEG1 Layer III, 128 kbps, 44.1 kHz, mono.
        let header = parse_frame_header(0xfffb_90c4).unwrap();

        // main_data_begin = 300, private = 0, scfsi = 1010, then a long granule channel:
        // part2_3_length = 1000, big_values = 100, global_gain = 150, scalefac_compress = 5,
        // window_switching = 0, table_select = [1, 2, 3], region0_count = 6, region1_count = 2,
        // preflag = 1, scalefac_scale = 0, count1table_select = 1.
        let fields: &[(u32, u32)] = &[
            (300, 9),
            (0, 5),
            (0b1010, 4),
            (1000, 12),
            (100, 9),
            (150, 8),
            (5, 4),
            (0, 1),
            (1, 5),
            (2, 5),
            (3, 5),
            (5, 4),
            (1, 3),
            (1, 1),
            (0, 1),
            (1, 1),
        ];

        let buf = pack(fields);
        let mut frame_data = FrameData::default();

        let len = read_side_info(&mut BitReaderLtr::new(&buf), &header, &mut frame_data).unwrap();

        assert_eq!(len, 17);
        assert_eq!(frame_data.main_data_begin, 300);
        assert_eq!(frame_data.scfsi[0], [true, false, true, false]);

        let channel = &frame_data.granules[0].channels[0];

        assert_eq!(channel.part2_3_length, 1000);
        assert_eq!(channel.big_values, 100);
        assert_eq!(channel.global_gain, 150);
        assert_eq!(channel.block_type, BlockType::Long);
        assert_eq!(channel.table_select, [1, 2, 3]);
        // Region0 is 6 bands, region1 is 2 bands.
        assert_eq!(channel.region1_start, 24);
        assert_eq!(channel.region2_start, 36);
        assert!(channel.preflag);
        assert!(!channel.scalefac_scale);
        assert!(channel.count1table_select);
    }

    #[test]
    fn verify_reject_reserved_block_type() {
        let header = parse_frame_header(0xfffb_90c4).unwrap();

        // Window switching with block_type 0.
        let fields: &[(u32, u32)] =
            &[(0, 9), (0, 5), (0, 4), (0, 12), (0, 9), (0, 8), (0, 4), (1, 1), (0, 2)];

        let buf = pack(fields);
        let mut frame_data = FrameData::default();

        assert!(read_side_info(&mut BitReaderLtr::new(&buf), &header, &mut frame_data).is_err());
    }

    #[test]
    fn verify_mpeg1_scfsi_reuse() {
        let mut frame_data = FrameData::default();
        frame_data.scfsi[0] = [true, false, false, true];
        frame_data.granules[0].channels[0].scalefac_compress = 15;
        frame_data.granules[1].channels[0].scalefac_compress = 15;

        // slen = (4, 3). Granule 0 codes all 21 bands.
        let mut fields = vec![(9, 4); 11];
        fields.extend(vec![(5, 3); 10]);

        let mut sf = ScaleFactors::default();
        let buf = pack(&fields);
        let bits =
            read_scale_factors_mpeg1(&mut BitReaderLtr::new(&buf), 0, 0, &frame_data, &mut sf)
                .unwrap();

        assert_eq!(bits, 11 * 4 + 10 * 3);

        // Granule 1 only codes bands 6..16.
        let mut fields = vec![(1, 4); 5];
        fields.extend(vec![(2, 3); 5]);

        let buf = pack(&fields);
        let bits =
            read_scale_factors_mpeg1(&mut BitReaderLtr::new(&buf), 1, 0, &frame_data, &mut sf)
                .unwrap();

        assert_eq!(bits, 5 * 4 + 5 * 3);
        assert_eq!(&sf.long[..6], &[9; 6]);
        assert_eq!(&sf.long[6..11], &[1; 5]);
        assert_eq!(&sf.long[11..16], &[2; 5]);
        assert_eq!(&sf.long[16..21], &[5; 5]);
    }

    #[test]
    fn verify_lsf_mixed_unpacking() {
        let mut channel = GranuleChannel {
            block_type: BlockType::Short { is_mixed: true },
            // slen = [1, 1, 1, 1] and nsfb = [6, 9, 9, 9].
            scalefac_compress: (1 << 4) * 5 + (1 << 4) + (1 << 2) + 1,
            ..Default::default()
        };

        let fields: Vec<(u32, u32)> = (0..33).map(|i| (i % 2, 1)).collect();
        let buf = pack(&fields);

        let mut sf = ScaleFactors::default();
        let bits =
            read_scale_factors_lsf(&mut BitReaderLtr::new(&buf), false, &mut channel, &mut sf)
                .unwrap();

        assert_eq!(bits, 33);
        assert!(!channel.preflag);
        assert_eq!(&sf.long[..6], &[0, 1, 0, 1, 0, 1]);
        // Flat index 6 is band 3, window 0.
        assert_eq!(sf.short[0][3], 0);
        assert_eq!(sf.short[1][3], 1);
        assert_eq!(sf.short[2][3], 0);
        assert_eq!(sf.short[0][4], 1);
        assert_eq!(sf.short[2][11], 0);
        assert_eq!(sf.short[1][11], 1);

        // Every band is coded with 1 bit.
        assert_eq!(&sf.long_is_max[..6], &[1; 6]);
        assert_eq!(sf.short_is_max[2][11], 1);
    }

    #[test]
    fn verify_lsf_intensity_positions() {
        let mut channel = GranuleChannel {
            // The intensity channel with scalefac_compress >> 1 = 13: slen = [0, 2, 1, 0] and
            // nsfb = [7, 7, 7, 0].
            scalefac_compress: 13 << 1,
            ..Default::default()
        };

        let mut fields = vec![(3, 2); 7];
        fields.extend(vec![(1, 1); 7]);

        let buf = pack(&fields);

        let mut sf = ScaleFactors::default();
        let bits =
            read_scale_factors_lsf(&mut BitReaderLtr::new(&buf), true, &mut channel, &mut sf)
                .unwrap();

        assert_eq!(bits, 7 * 2 + 7);
        assert_eq!(&sf.long[..7], &[0; 7]);
        assert_eq!(&sf.long[7..14], &[3; 7]);
        assert_eq!(&sf.long[14..21], &[1; 7]);

        // Uncoded bands may only hold position 0.
        assert_eq!(&sf.long_is_max[..7], &[0; 7]);
        assert_eq!(&sf.long_is_max[7..14], &[3; 7]);
        assert_eq!(&sf.long_is_max[14..21], &[1; 7]);
        assert_eq!(sf.long_is_max[21], 0);
    }

    fn pack(fields: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut pos = 0;

        for &(value, len) in fields {
            for i in (0..len).rev() {
                if (value >> i) & 1 != 0 {
                    buf[pos >> 3] |= 0x80 >> (pos & 7);
                }
                pos += 1;
            }
        }

        buf
    }
}
