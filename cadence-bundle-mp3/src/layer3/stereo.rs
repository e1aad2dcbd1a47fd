// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::max;
use std::{f32, f64};

use cadence_core::errors::{decode_error, Result};

use lazy_static::lazy_static;

use crate::common::*;

use super::bitstream::mixed_long_bands;
use super::{Granule, ScaleFactors};

/// The invalid intensity position for MPEG1 bitstreams.
///
/// For MPEG2 and MPEG2.5 bitstreams, the invalid position of a band is the largest value its
/// scale factor can be coded with, and is carried with the scale factors.
const INTENSITY_INV_POS_MPEG1: u8 = 7;

lazy_static! {
    /// (Left, right) channel coefficients for decoding intensity stereo in MPEG2 bitstreams.
    ///
    /// These coefficients are derived from section 2.4.3.2 of ISO/IEC 13818-3.
    ///
    /// As per the standard, for a given intensity position, is_pos (0 <= is_pos < 32), the
    /// channel coefficients, k_l and k_r, may be calculated as per the table below:
    ///
    /// ```text
    /// If...            | k_l                     | k_r
    /// -----------------+-------------------------+-------------------
    /// is_pos     == 0  | 1.0                     | 1.0
    /// is_pos & 1 == 1  | i0 ^ [(is_pos + 1) / 2] | 1.0
    /// is_pos & 1 == 0  | 1.0                     | i0 ^ (is_pos / 2)
    /// ```
    ///
    /// The value of i0 is dependant on the least significant bit of scalefac_compress.
    ///
    /// ```text
    /// scalefac_compress & 1 | i0
    /// ----------------------+---------------------
    /// 0                     | 1 / sqrt(sqrt(2.0))
    /// 1                     | 1 / sqrt(2.0)
    /// ```
    ///
    /// The first dimension of this table is indexed by scalefac_compress & 1 to select i0. The
    /// second dimension is indexed by is_pos to obtain the channel coefficients.
    static ref INTENSITY_STEREO_RATIOS_MPEG2: [[(f32, f32); 32]; 2] = {
        let is_scale: [f64; 2] = [
            1.0 / f64::sqrt(f64::consts::SQRT_2),
            f64::consts::FRAC_1_SQRT_2,
        ];

        let mut ratios = [[(0.0, 0.0); 32]; 2];

        for is_pos in 0..32usize {
            for (scale, table) in is_scale.iter().zip(ratios.iter_mut()) {
                table[is_pos] = if is_pos & 1 != 0 {
                    (scale.powf((is_pos + 1) as f64 / 2.0) as f32, 1.0)
                }
                else {
                    (1.0, scale.powf(is_pos as f64 / 2.0) as f32)
                };
            }
        }

        ratios
    };
}

lazy_static! {
    /// (Left, right) channel coeffcients for decoding intensity stereo in MPEG1 bitstreams.
    ///
    /// These coefficients are derived from section 2.4.3.4.9.3 of ISO/IEC 11172-3. For a given
    /// intensity position, is_pos (0 <= is_pos < 7):
    ///
    /// ```text
    /// is_ratio = tan(is_pos * PI/12)
    /// k_l = is_ratio / (1 + is_ratio)
    /// k_r =        1 / (1 + is_ratio)
    /// ```
    static ref INTENSITY_STEREO_RATIOS_MPEG1: [(f32, f32); 7] = {
        const PI_12: f64 = f64::consts::PI / 12.0;

        let mut ratios = [(0.0, 0.0); 7];

        for (is_pos, ratio) in ratios.iter_mut().enumerate() {
            let is_ratio = (PI_12 * is_pos as f64).tan();
            *ratio = ((is_ratio / (1.0 + is_ratio)) as f32, (1.0 / (1.0 + is_ratio)) as f32);
        }

        // tan(PI/2) is infinite.
        ratios[6] = (1.0, 0.0);

        ratios
    };
}

/// Decorrelates mid and side channels into left and right channels.
///
/// ```text
///      l[i] = (m[i] + s[i]) / sqrt(2)
///      r[i] = (m[i] - s[i]) / sqrt(2)
/// ```
///
/// The mid channel is transmitted in channel 0, and the side channel in channel 1. After decoding,
/// the left channel replaces mid, and the right channel replaces side.
fn process_mid_side(mid: &mut [f32], side: &mut [f32]) {
    debug_assert!(mid.len() == side.len());

    for (m, s) in mid.iter_mut().zip(side) {
        let left = (*m + *s) * f32::consts::FRAC_1_SQRT_2;
        let right = (*m - *s) * f32::consts::FRAC_1_SQRT_2;
        *m = left;
        *s = right;
    }
}

/// The intensity stereo parameters of a channel pair.
struct Intensity {
    table: &'static [(f32, f32)],
    is_lsf: bool,
    mid_side: bool,
}

impl Intensity {
    fn new(header: &FrameHeader, granule: &Granule, mid_side: bool) -> Self {
        let table = if header.is_mpeg1() {
            &INTENSITY_STEREO_RATIOS_MPEG1[..]
        }
        else {
            let is_scale = granule.channels[1].scalefac_compress & 1;
            &INTENSITY_STEREO_RATIOS_MPEG2[usize::from(is_scale)][..]
        };

        Intensity { table, is_lsf: !header.is_mpeg1(), mid_side }
    }

    /// Gets the invalid intensity position of a band given its largest codable LSF position.
    #[inline(always)]
    fn invalid_pos(&self, lsf_max: u8) -> u8 {
        if self.is_lsf {
            lsf_max
        }
        else {
            INTENSITY_INV_POS_MPEG1
        }
    }

    /// Decodes channel 0 of an intensity stereo coded band into the left and right channels.
    ///
    /// ```text
    ///      l[i] = ch0[i] * k_l
    ///      r[i] = ch0[i] * k_r
    /// ```
    ///
    /// Bands with an invalid intensity position fall back to mid-side stereo, if enabled.
    fn process(&self, is_pos: u8, invalid_pos: u8, ch0: &mut [f32], ch1: &mut [f32]) {
        if is_pos < invalid_pos {
            let (ratio_l, ratio_r) = self.table[usize::from(is_pos)];

            for (l, r) in ch0.iter_mut().zip(ch1) {
                let is = *l;
                *l = ratio_l * is;
                *r = ratio_r * is;
            }
        }
        else if self.mid_side {
            process_mid_side(ch0, ch1);
        }
    }
}

/// Determines if a band is zeroed.
#[inline(always)]
fn is_zero_band(band: &[f32]) -> bool {
    !band.iter().any(|&x| x != 0.0)
}

/// Decodes the intensity stereo coded bands of a long block and returns the intensity bound.
fn process_intensity_long_block(
    header: &FrameHeader,
    is: &Intensity,
    sf: &ScaleFactors,
    rzero: usize,
    max_bound: usize,
    ch0: &mut [f32; 576],
    ch1: &mut [f32; 576],
) -> usize {
    // All bands starting after the last non-zero band in channel 1 are intensity stereo coded. The
    // scale factors of channel 1 for those bands are the intensity positions.
    let bands = &SFB_LONG_BANDS[header.sample_rate_idx];

    // The intensity position for band 21 is not coded and is copied from band 20.
    let mut is_pos = [0; 22];
    is_pos.copy_from_slice(&sf.long[..22]);
    is_pos[21] = is_pos[20];

    let mut is_max = [0; 22];
    is_max.copy_from_slice(&sf.long_is_max[..22]);
    is_max[21] = is_max[20];

    let mut bound = max_bound;

    for (sfb, (&start, &end)) in bands.iter().zip(&bands[1..]).enumerate().rev() {
        // Bands starting above rzero are always 0, however bands below it are ambiguous.
        if start < rzero && !is_zero_band(&ch1[start..end]) {
            break;
        }

        let invalid_pos = is.invalid_pos(is_max[sfb]);
        is.process(is_pos[sfb], invalid_pos, &mut ch0[start..end], &mut ch1[start..end]);

        bound = start;
    }

    bound
}

/// Decodes the intensity stereo coded bands of a short, or mixed, block and returns the intensity
/// bound.
fn process_intensity_short_block(
    header: &FrameHeader,
    is: &Intensity,
    sf: &ScaleFactors,
    is_mixed: bool,
    max_bound: usize,
    ch0: &mut [f32; 576],
    ch1: &mut [f32; 576],
) -> usize {
    // For short blocks, each band is composed of 3 windows stored consecutively. Each window of the
    // same index is logically contiguous and has its own intensity bound: the windows of the bands
    // above the last non-zero band of that window in channel 1.
    //
    // For mixed blocks, the long bands at the start follow the same rules as long blocks, but are
    // only considered if no short window has a non-zero band in channel 1.
    let short_bands = &SFB_SHORT_BANDS[header.sample_rate_idx];

    let first_sfb = if is_mixed { MIXED_FIRST_SHORT_BAND } else { 0 };

    // The intensity position for the final band is not coded and is copied from the previous band.
    let mut is_pos = [[0u8; 13]; 3];
    let mut is_max = [[0u8; 13]; 3];

    for (pos, sf) in is_pos.iter_mut().zip(&sf.short) {
        pos.copy_from_slice(sf);
        pos[12] = pos[11];
    }

    for (max, sf_max) in is_max.iter_mut().zip(&sf.short_is_max) {
        max.copy_from_slice(sf_max);
        max[12] = max[11];
    }

    let mut window_is_zero = [true; 3];

    let mut bound = max_bound;
    let mut found_bound = false;

    for sfb in (first_sfb..13).rev() {
        for win in (0..3).rev() {
            let start = short_bands[3 * sfb + win];
            let end = short_bands[3 * sfb + win + 1];

            // Once a window is non-zero, the remaining lower bands of that window are mid-side
            // coded. The short-circuit avoids the costly zero-check.
            window_is_zero[win] = window_is_zero[win] && is_zero_band(&ch1[start..end]);

            if window_is_zero[win] {
                let pos = is_pos[win][sfb];
                let invalid_pos = is.invalid_pos(is_max[win][sfb]);
                is.process(pos, invalid_pos, &mut ch0[start..end], &mut ch1[start..end]);
            }
            else if is.mid_side {
                process_mid_side(&mut ch0[start..end], &mut ch1[start..end]);
            }
        }

        // All three windows of the band have now been processed with either intensity or
        // mid-side stereo.
        bound = short_bands[3 * sfb];

        // If all windows are non-zero then all the remaining bands are processed with mid-side
        // stereo.
        found_bound = window_is_zero.iter().all(|&zero| !zero);

        if found_bound {
            break;
        }
    }

    if is_mixed && !found_bound {
        let long_bands = &SFB_LONG_BANDS[header.sample_rate_idx][..=mixed_long_bands(header)];

        for (sfb, (&start, &end)) in long_bands.iter().zip(&long_bands[1..]).enumerate().rev() {
            if !is_zero_band(&ch1[start..end]) {
                break;
            }

            let invalid_pos = is.invalid_pos(sf.long_is_max[sfb]);
            is.process(sf.long[sfb], invalid_pos, &mut ch0[start..end], &mut ch1[start..end]);

            bound = start;
        }
    }

    bound
}

/// Perform joint stereo decoding on the channel pair. `rzero` is updated to the number of
/// non-zero samples in each channel after decoding.
pub(super) fn stereo(
    header: &FrameHeader,
    granule: &Granule,
    scalefacs: &[ScaleFactors; 2],
    rzero: &mut [usize; 2],
    ch: &mut [[f32; 576]; 2],
) -> Result<()> {
    // Determine whether mid-side, and/or intensity stereo coding is used.
    let (mid_side, intensity) = match header.channel_mode {
        ChannelMode::JointStereo(Mode::Layer3 { mid_side, intensity }) => (mid_side, intensity),
        _ => return Ok(()),
    };

    // The block types must be the same.
    if granule.channels[0].block_type != granule.channels[1].block_type {
        return decode_error("mpa: stereo channel pair block_type mismatch");
    }

    let [ch0, ch1] = ch;

    // Each scale-factor band may use either mid-side, intensity, or no stereo encoding, determined
    // by the MPEG version, the mode extension, the block type, and the content of the bands.
    let end = max(rzero[0], rzero[1]);

    let is_bound = if intensity {
        let is = Intensity::new(header, granule, mid_side);
        let sf = &scalefacs[1];

        match granule.channels[1].block_type {
            BlockType::Short { is_mixed } => {
                process_intensity_short_block(header, &is, sf, is_mixed, end, ch0, ch1)
            }
            _ => process_intensity_long_block(header, &is, sf, rzero[1], end, ch0, ch1),
        }
    }
    else {
        // Without intensity stereo, all samples up to the end of the non-zero portion of the
        // samples are mid-side coded.
        end
    };

    if mid_side && is_bound > 0 {
        process_mid_side(&mut ch0[0..is_bound], &mut ch1[0..is_bound]);
    }

    // After joint stereo decoding, both channels have the same number of non-zero samples.
    rzero[0] = end;
    rzero[1] = end;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_frame_header;

    // MPEG1 Layer III, 44.1 kHz, joint stereo with mode extension bits set to `ext`.
    fn joint_stereo_header(ext: u32) -> FrameHeader {
        parse_frame_header(0xfffb_9040 | (ext << 4)).unwrap()
    }

    #[test]
    fn verify_mid_side() {
        let header = joint_stereo_header(0b10);
        let granule = Granule::default();

        let mut ch = [[0f32; 576]; 2];
        ch[0][0] = 1.0;
        ch[1][0] = 1.0;
        ch[0][1] = 2.0;

        let mut rzero = [2, 1];
        stereo(&header, &granule, &Default::default(), &mut rzero, &mut ch).unwrap();

        let k = f32::consts::FRAC_1_SQRT_2;

        assert!((ch[0][0] - 2.0 * k).abs() < 1e-6);
        assert!(ch[1][0].abs() < 1e-6);
        assert!((ch[0][1] - 2.0 * k).abs() < 1e-6);
        assert!((ch[1][1] - 2.0 * k).abs() < 1e-6);
        assert_eq!(rzero, [2, 2]);
    }

    #[test]
    fn verify_intensity_long() {
        let header = joint_stereo_header(0b01);
        let granule = Granule::default();

        let mut ch = [[0f32; 576]; 2];
        ch[0].fill(1.0);
        // Band 1 of channel 1 is non-zero, so bands 2.. are intensity coded.
        ch[1][4] = 0.5;

        let mut scalefacs: [ScaleFactors; 2] = Default::default();
        scalefacs[1].long[2] = 6;
        scalefacs[1].long[3] = 0;
        scalefacs[1].long[4] = 7;

        let mut rzero = [576, 5];
        stereo(&header, &granule, &scalefacs, &mut rzero, &mut ch).unwrap();

        // Band 1 and below are not processed.
        assert_eq!(ch[0][4], 1.0);
        assert_eq!(ch[1][4], 0.5);
        // Position 6 is fully left.
        assert_eq!((ch[0][8], ch[1][8]), (1.0, 0.0));
        // Position 0 is fully right.
        assert_eq!((ch[0][12], ch[1][12]), (0.0, 1.0));
        // Position 7 is invalid and left as is.
        assert_eq!((ch[0][16], ch[1][16]), (1.0, 0.0));
    }

    #[test]
    fn verify_intensity_long_lsf() {
        // MPEG2 Layer III, 22.05 kHz, joint stereo with only intensity stereo enabled.
        let header = parse_frame_header(0xfff3_8050).unwrap();
        let granule = Granule::default();

        let mut ch = [[0f32; 576]; 2];
        ch[0].fill(1.0);

        let mut scalefacs: [ScaleFactors; 2] = Default::default();
        // Bands 0 and 1 are coded with 3 bits, bands 10 and 11 with 4 bits.
        scalefacs[1].long[0] = 7;
        scalefacs[1].long_is_max[0] = 7;
        scalefacs[1].long[1] = 3;
        scalefacs[1].long_is_max[1] = 7;
        scalefacs[1].long[10] = 15;
        scalefacs[1].long_is_max[10] = 15;
        scalefacs[1].long[11] = 2;
        scalefacs[1].long_is_max[11] = 15;

        let mut rzero = [576, 0];
        stereo(&header, &granule, &scalefacs, &mut rzero, &mut ch).unwrap();

        let i0 = 1.0 / f32::sqrt(f32::consts::SQRT_2);

        // The largest codable position is invalid and the band is left as is.
        assert_eq!((ch[0][0], ch[1][0]), (1.0, 0.0));
        assert_eq!((ch[0][80], ch[1][80]), (1.0, 0.0));
        // Odd positions attenuate the left channel.
        assert!((ch[0][6] - i0 * i0).abs() < 1e-6);
        assert_eq!(ch[1][6], 1.0);
        // Even positions attenuate the right channel.
        assert_eq!(ch[0][96], 1.0);
        assert!((ch[1][96] - i0).abs() < 1e-6);
        // Uncoded bands can only hold position 0, which is then invalid.
        assert_eq!((ch[0][500], ch[1][500]), (1.0, 0.0));
    }

    #[test]
    fn verify_block_type_mismatch() {
        let header = joint_stereo_header(0b11);
        let mut granule = Granule::default();
        granule.channels[1].block_type = BlockType::Short { is_mixed: false };

        let mut ch = [[0f32; 576]; 2];
        let mut rzero = [0, 0];

        assert!(stereo(&header, &granule, &Default::default(), &mut rzero, &mut ch).is_err());
    }
}
