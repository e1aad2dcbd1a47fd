// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Justification: Some loops are better expressed without a range loop.
#![allow(clippy::needless_range_loop)]

use std::f64;

use lazy_static::lazy_static;

use crate::common::*;

use super::GranuleChannel;

lazy_static! {
    /// Hybrid synthesesis IMDCT window coefficients for: Long, Start, Short, and End block, in that
    /// order.
    ///
    /// For long blocks:
    ///
    /// ```text
    /// W[ 0..36] = sin(PI/36.0 * (i + 0.5))
    /// ```
    ///
    /// For start blocks:
    ///
    /// ```text
    /// W[ 0..18] = sin(PI/36.0 * (i + 0.5))
    /// W[18..24] = 1.0
    /// W[24..30] = sin(PI/12.0 * ((i - 18) - 0.5))
    /// W[30..36] = 0.0
    /// ```
    ///
    /// For short blocks (to be applied to each 12 sample window):
    ///
    /// ```text
    /// W[ 0..12] = sin(PI/12.0 * (i + 0.5))
    /// W[12..36] = 0.0
    /// ```
    ///
    /// For end blocks:
    ///
    /// ```text
    /// W[ 0..6 ] = 0.0
    /// W[ 6..12] = sin(PI/12.0 * ((i - 6) + 0.5))
    /// W[12..18] = 1.0
    /// W[18..36] = sin(PI/36.0 * (i + 0.5))
    /// ```
    static ref IMDCT_WINDOWS: [[f32; 36]; 4] = {
        const PI_36: f64 = f64::consts::PI / 36.0;
        const PI_12: f64 = f64::consts::PI / 12.0;

        let mut windows = [[0f32; 36]; 4];

        // Window for Long blocks.
        for i in 0..36 {
            windows[0][i] = (PI_36 * (i as f64 + 0.5)).sin() as f32;
        }

        // Window for Start blocks (indicies 30..36 implictly 0.0).
        for i in 0..18 {
            windows[1][i] = (PI_36 * (i as f64 + 0.5)).sin() as f32;
        }
        for i in 18..24 {
            windows[1][i] = 1.0;
        }
        for i in 24..30 {
            windows[1][i] = (PI_12 * ((i - 18) as f64 + 0.5)).sin() as f32;
        }

        // Window for Short blocks.
        for i in 0..12 {
            windows[2][i] = (PI_12 * (i as f64 + 0.5)).sin() as f32;
        }

        // Window for End blocks (indicies 0..6 implicitly 0.0).
        for i in 6..12 {
            windows[3][i] = (PI_12 * ((i - 6) as f64 + 0.5)).sin() as f32;
        }
        for i in 12..18 {
            windows[3][i] = 1.0;
        }
        for i in 18..36 {
            windows[3][i] = (PI_36 * (i as f64 + 0.5)).sin() as f32;
        }

        windows
   };
}

lazy_static! {
    /// Cosine coefficients of the 36-point IMDCT.
    ///
    /// ```text
    /// cos36[i][k] = cos(PI/72.0 * (2*i + 1 + N/2) * (2*k + 1))
    /// ```
    /// where:
    ///     `N=36`, `i=0..N`, and `k=0..N/2`.
    static ref IMDCT_COS_36: [[f32; 18]; 36] = {
        const PI_72: f64 = f64::consts::PI / 72.0;

        let mut cos = [[0f32; 18]; 36];

        for (i, cos_i) in cos.iter_mut().enumerate() {
            for (k, cos_ik) in cos_i.iter_mut().enumerate() {
                *cos_ik = (PI_72 * ((2 * i + 1 + 18) * (2 * k + 1)) as f64).cos() as f32;
            }
        }

        cos
    };
}

lazy_static! {
    /// Cosine coefficients of the 12-point IMDCT.
    ///
    /// ```text
    /// cos12[i][k] = cos(PI/24.0 * (2*i + 1 + N/2) * (2*k + 1))
    /// ```
    /// where:
    ///     `N=12`, `i=0..N`, and `k=0..N/2`.
    static ref IMDCT_COS_12: [[f32; 6]; 12] = {
        const PI_24: f64 = f64::consts::PI / 24.0;

        let mut cos = [[0f32; 6]; 12];

        for (i, cos_i) in cos.iter_mut().enumerate() {
            for (k, cos_ik) in cos_i.iter_mut().enumerate() {
                *cos_ik = (PI_24 * ((2 * i + 1 + 6) * (2 * k + 1)) as f64).cos() as f32;
            }
        }

        cos
    };
}

lazy_static! {
    /// Pair of lookup tables, CS and CA, for alias reduction.
    ///
    /// As per ISO/IEC 11172-3, CS and CA are calculated as follows:
    ///
    /// ```text
    /// cs[i] =  1.0 / sqrt(1.0 + c[i]^2)
    /// ca[i] = c[i] / sqrt(1.0 + c[i]^2)
    /// ```
    ///
    /// where:
    /// ```text
    /// c[i] = [ -0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037 ]
    /// ```
    static ref ANTIALIAS_CS_CA: ([f32; 8], [f32; 8]) = {
        const C: [f64; 8] = [ -0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037 ];

        let mut cs = [0f32; 8];
        let mut ca = [0f32; 8];

        for i in 0..8 {
            let sqrt = f64::sqrt(1.0 + (C[i] * C[i]));
            cs[i] = (1.0 / sqrt) as f32;
            ca[i] = (C[i] / sqrt) as f32;
        }

        (cs, ca)
    };
}

/// Reorder samples that are part of short blocks into sub-band order.
pub(super) fn reorder(header: &FrameHeader, channel: &GranuleChannel, buf: &mut [f32; 576]) {
    // Only short blocks are reordered.
    if let BlockType::Short { is_mixed } = channel.block_type {
        // Every short block is split into 3 equally sized windows as illustrated below (e.g. for
        // a short scale factor band with win_len=4):
        //
        //    <- Window #1 ->  <- Window #2 ->  <- Window #3 ->
        //   [ 0 | 1 | 2 | 3 ][ 4 | 5 | 6 | 7 ][ 8 | 9 | a | b ]
        //    <-----  3 * Short Scale Factor Band Width  ----->
        //
        // Reordering interleaves the samples of each window as follows:
        //
        //   [ 0 | 4 | 8 | 1 | 5 | 9 | 2 | 6 | a | 3 | 7 | b ]
        //    <----  3 * Short Scale Factor Band Width  ---->
        //
        // In mixed blocks, only the short bands are re-ordered.
        let first_sfb = if is_mixed { MIXED_FIRST_SHORT_BAND } else { 0 };

        let bands = &SFB_SHORT_BANDS[header.sample_rate_idx][3 * first_sfb..];

        let start = bands[0];

        let mut reorder_buf = [0f32; 576];

        let mut i = start;

        for (((s0, s1), s2), s3) in
            bands.iter().zip(&bands[1..]).zip(&bands[2..]).zip(&bands[3..]).step_by(3)
        {
            // The three short sample windows.
            let win0 = &buf[*s0..*s1];
            let win1 = &buf[*s1..*s2];
            let win2 = &buf[*s2..*s3];

            for ((w0, w1), w2) in win0.iter().zip(win1).zip(win2) {
                reorder_buf[i + 0] = *w0;
                reorder_buf[i + 1] = *w1;
                reorder_buf[i + 2] = *w2;
                i += 3;
            }
        }

        buf[start..i].copy_from_slice(&reorder_buf[start..i]);
    }
}

/// Applies the anti-aliasing filter to sub-bands that are not part of short blocks.
pub(super) fn antialias(channel: &GranuleChannel, samples: &mut [f32; 576]) {
    // The number of sub-bands to anti-aliasing depends on block type.
    let sb_end = match channel.block_type {
        // Short blocks are never anti-aliased.
        BlockType::Short { is_mixed: false } => return,
        // Mixed blocks have a long block span the first 36 samples (2 sub-bands). Therefore, only
        // the boundary between these two sub-bands is anti-aliased.
        BlockType::Short { is_mixed: true } => 2 * 18,
        // All other block types require all 32 sub-bands to be anti-aliased.
        _ => 32 * 18,
    };

    // Amortize the lazy_static fetch over the entire anti-aliasing operation.
    let (cs, ca): &([f32; 8], [f32; 8]) = &ANTIALIAS_CS_CA;

    // Anti-aliasing is performed using 8 butterfly calculations at the boundaries of ADJACENT
    // sub-bands. For each calculation, there are two samples: lower and upper. For each iteration,
    // the lower sample index advances backwards from the boundary, while the upper sample index
    // advances forward from the boundary.
    //
    // The butterfly calculation itself can be illustrated as follows:
    //
    //              * cs[i]
    //   l0 -------o------(-)------> l1
    //               \    /                  l1 = l0 * cs[i] - u0 * ca[i]
    //                \  / * ca[i]           u1 = u0 * cs[i] + l0 * ca[i]
    //                 \
    //               /  \  * ca[i]           where:
    //             /     \                       cs[i], ca[i] are constant values for iteration i,
    //   u0 ------o------(+)-------> u1          derived from table B.9 of ISO/IEC 11172-3.
    //             * cs[i]
    for sb in (18..sb_end).step_by(18) {
        for i in 0..8 {
            let li = sb - 1 - i;
            let ui = sb + i;
            let lower = samples[li];
            let upper = samples[ui];
            samples[li] = lower * cs[i] - upper * ca[i];
            samples[ui] = upper * cs[i] + lower * ca[i];
        }
    }
}

/// Performs hybrid synthesis (IMDCT and windowing).
pub(super) fn hybrid_synthesis(
    channel: &GranuleChannel,
    overlap: &mut [[f32; 18]; 32],
    samples: &mut [f32; 576],
) {
    // Determine the number of sub-bands to process as long blocks. Short blocks process 0 sub-bands
    // as long blocks, mixed blocks process the first 2 sub-bands as long blocks, and all other
    // block types (long, start, end) process all 32 sub-bands as long blocks.
    let n_long_bands = match channel.block_type {
        BlockType::Short { is_mixed: false } => 0,
        BlockType::Short { is_mixed: true } => 2,
        _ => 32,
    };

    let long_window: &[f32; 36] = match channel.block_type {
        BlockType::Start => &IMDCT_WINDOWS[1],
        BlockType::End => &IMDCT_WINDOWS[3],
        _ => &IMDCT_WINDOWS[0],
    };

    let short_window: &[f32; 36] = &IMDCT_WINDOWS[2];

    let sub_bands = samples.chunks_exact_mut(18).zip(overlap.iter_mut());

    for (sb, (sub_band, overlap)) in sub_bands.enumerate() {
        let mut x = [0f32; 18];
        x.copy_from_slice(sub_band);

        let mut out = [0f32; 36];

        if sb < n_long_bands {
            imdct36_win(&x, long_window, &mut out);
        }
        else {
            imdct12_win(&x, short_window, &mut out);
        }

        // Overlap-add with the second half of the previous granule.
        for i in 0..18 {
            sub_band[i] = out[i] + overlap[i];
            overlap[i] = out[i + 18];
        }
    }
}

/// Performs the windowed 36-point IMDCT of a sub-band.
fn imdct36_win(x: &[f32; 18], window: &[f32; 36], out: &mut [f32; 36]) {
    let cos36: &[[f32; 18]; 36] = &IMDCT_COS_36;

    // The IMDCT is defined as:
    //
    //        (N/2)-1
    // y[i] =   SUM   { x[k] * cos(PI/2N * (2i + 1 + N/2) * (2k + 1)) }
    //          k=0
    for i in 0..36 {
        let y: f32 = x.iter().zip(&cos36[i]).map(|(&x, &c)| x * c).sum();
        out[i] = y * window[i];
    }
}

/// Performs the 12-point IMDCT, and windowing for each of the 3 short windows of a short block.
///
/// The windows are interleaved in the sub-band such that `x[3 * k + w]` is sample `k` of window
/// `w`. Adjacent windows overlap by 6 samples, and the first and last 6 samples of the output are
/// always 0.
///
/// ```text
/// 0             6           12           18           24           30            36
/// +-------------+------------+------------+------------+------------+-------------+
/// |      0      |  y0[..6]   |  y0[6..]   |  y1[6..]   |  y2[6..]   |      0      |
/// |     (6)     |            |  + y1[..6] |  + y2[..6] |            |     (6)     |
/// +-------------+------------+------------+------------+------------+-------------+
/// ```
fn imdct12_win(x: &[f32; 18], window: &[f32; 36], out: &mut [f32; 36]) {
    let cos12: &[[f32; 6]; 12] = &IMDCT_COS_12;

    for w in 0..3 {
        for i in 0..12 {
            let y: f32 = (0..6).map(|k| x[3 * k + w] * cos12[i][k]).sum();
            out[6 + 6 * w + i] += y * window[i];
        }
    }
}

/// Inverts odd samples in odd sub-bands.
pub(super) fn frequency_inversion(samples: &mut [f32; 576]) {
    // There are 32 sub-bands spanning 576 samples:
    //
    //        0    18    36    54    72    90   108       558    576
    //        +-----+-----+-----+-----+-----+-----+ . . . . +------+
    // s[i] = | sb0 | sb1 | sb2 | sb3 | sb4 | sb5 | . . . . | sb31 |
    //        +-----+-----+-----+-----+-----+-----+ . . . . +------+
    //
    // Each odd sample in the odd sub-bands must be negated.
    for sub_band in samples.chunks_exact_mut(18).skip(1).step_by(2) {
        for sample in sub_band.iter_mut().skip(1).step_by(2) {
            *sample = -*sample;
        }
    }
}
