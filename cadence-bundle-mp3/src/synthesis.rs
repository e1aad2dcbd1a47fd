// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `synthesis` module implements the polyphase synthesis filterbank of the MPEG audio standard.

use std::f64;

use cadence_core::audio::{OutputSink, SUBBAND_BLOCK_LEN};

use lazy_static::lazy_static;

use crate::common::DecodeContext;

/// The gain applied to synthesized samples to bring them to 16-bit full scale.
const OUTPUT_SCALE: f32 = 32700.0;

/// The synthesis window, D[0..512] of table B.3 in ISO/IEC 11172-3, rearranged such that
/// `SYNTHESIS_D16[i][k] = D[32 * k + i]`.
#[rustfmt::skip]
const SYNTHESIS_D16: [[f32; 16]; 32] = [
    [
         0.000000000, -0.000442505,  0.003250122, -0.007003784,
         0.031082153, -0.078628540,  0.100311279, -0.572036743,
         1.144989014,  0.572036743,  0.100311279,  0.078628540,
         0.031082153,  0.007003784,  0.003250122,  0.000442505,
    ],
    [
        -0.000015259, -0.000473022,  0.003326416, -0.007919312,
         0.030517578, -0.084182739,  0.090927124, -0.600219727,
         1.144287109,  0.543823242,  0.108856201,  0.073059082,
         0.031478882,  0.006118774,  0.003173828,  0.000396729,
    ],
    [
        -0.000015259, -0.000534058,  0.003387451, -0.008865356,
         0.029785156, -0.089706421,  0.080688477, -0.628295898,
         1.142211914,  0.515609741,  0.116577148,  0.067520142,
         0.031738281,  0.005294800,  0.003082275,  0.000366211,
    ],
    [
        -0.000015259, -0.000579834,  0.003433228, -0.009841919,
         0.028884888, -0.095169067,  0.069595337, -0.656219482,
         1.138763428,  0.487472534,  0.123474121,  0.061996460,
         0.031845093,  0.004486084,  0.002990723,  0.000320435,
    ],
    [
        -0.000015259, -0.000625610,  0.003463745, -0.010848999,
         0.027801514, -0.100540161,  0.057617188, -0.683914185,
         1.133926392,  0.459472656,  0.129577637,  0.056533813,
         0.031814575,  0.003723145,  0.002899170,  0.000289917,
    ],
    [
        -0.000015259, -0.000686646,  0.003479004, -0.011886597,
         0.026535034, -0.105819702,  0.044784546, -0.711318970,
         1.127746582,  0.431655884,  0.134887695,  0.051132202,
         0.031661987,  0.003005981,  0.002792358,  0.000259399,
    ],
    [
        -0.000015259, -0.000747681,  0.003479004, -0.012939453,
         0.025085449, -0.110946655,  0.031082153, -0.738372803,
         1.120223999,  0.404083252,  0.139450073,  0.045837402,
         0.031387329,  0.002334595,  0.002685547,  0.000244141,
    ],
    [
        -0.000030518, -0.000808716,  0.003463745, -0.014022827,
         0.023422241, -0.115921021,  0.016510010, -0.765029907,
         1.111373901,  0.376800537,  0.143264771,  0.040634155,
         0.031005859,  0.001693726,  0.002578735,  0.000213623,
    ],
    [
        -0.000030518, -0.000885010,  0.003417969, -0.015121460,
         0.021575928, -0.120697021,  0.001068115, -0.791213989,
         1.101211548,  0.349868774,  0.146362305,  0.035552979,
         0.030532837,  0.001098633,  0.002456665,  0.000198364,
    ],
    [
        -0.000030518, -0.000961304,  0.003372192, -0.016235352,
         0.019531250, -0.125259399, -0.015228271, -0.816864014,
         1.089782715,  0.323318481,  0.148773193,  0.030609131,
         0.029937744,  0.000549316,  0.002349854,  0.000167847,
    ],
    [
        -0.000030518, -0.001037598,  0.003280640, -0.017349243,
         0.017257690, -0.129562378, -0.032379150, -0.841949463,
         1.077117920,  0.297210693,  0.150497437,  0.025817871,
         0.029281616,  0.000030518,  0.002243042,  0.000152588,
    ],
    [
        -0.000045776, -0.001113892,  0.003173828, -0.018463135,
         0.014801025, -0.133590698, -0.050354004, -0.866363525,
         1.063217163,  0.271591187,  0.151596069,  0.021179199,
         0.028533936, -0.000442505,  0.002120972,  0.000137329,
    ],
    [
        -0.000045776, -0.001205444,  0.003051758, -0.019577026,
         0.012115479, -0.137298584, -0.069168091, -0.890090942,
         1.048156738,  0.246505737,  0.152069092,  0.016708374,
         0.027725220, -0.000869751,  0.002014160,  0.000122070,
    ],
    [
        -0.000061035, -0.001296997,  0.002883911, -0.020690918,
         0.009231567, -0.140670776, -0.088775635, -0.913055420,
         1.031936646,  0.221984863,  0.151962280,  0.012420654,
         0.026840210, -0.001266479,  0.001907349,  0.000106812,
    ],
    [
        -0.000061035, -0.001388550,  0.002700806, -0.021789551,
         0.006134033, -0.143676758, -0.109161377, -0.935195923,
         1.014617920,  0.198059082,  0.151306152,  0.008316040,
         0.025909424, -0.001617432,  0.001785278,  0.000106812,
    ],
    [
        -0.000076294, -0.001480103,  0.002487183, -0.022857666,
         0.002822876, -0.146255493, -0.130310059, -0.956481934,
         0.996246338,  0.174789429,  0.150115967,  0.004394531,
         0.024932861, -0.001937866,  0.001693726,  0.000091553,
    ],
    [
        -0.000076294, -0.001586914,  0.002227783, -0.023910522,
        -0.000686646, -0.148422241, -0.152206421, -0.976852417,
         0.976852417,  0.152206421,  0.148422241,  0.000686646,
         0.023910522, -0.002227783,  0.001586914,  0.000076294,
    ],
    [
        -0.000091553, -0.001693726,  0.001937866, -0.024932861,
        -0.004394531, -0.150115967, -0.174789429, -0.996246338,
         0.956481934,  0.130310059,  0.146255493, -0.002822876,
         0.022857666, -0.002487183,  0.001480103,  0.000076294,
    ],
    [
        -0.000106812, -0.001785278,  0.001617432, -0.025909424,
        -0.008316040, -0.151306152, -0.198059082, -1.014617920,
         0.935195923,  0.109161377,  0.143676758, -0.006134033,
         0.021789551, -0.002700806,  0.001388550,  0.000061035,
    ],
    [
        -0.000106812, -0.001907349,  0.001266479, -0.026840210,
        -0.012420654, -0.151962280, -0.221984863, -1.031936646,
         0.913055420,  0.088775635,  0.140670776, -0.009231567,
         0.020690918, -0.002883911,  0.001296997,  0.000061035,
    ],
    [
        -0.000122070, -0.002014160,  0.000869751, -0.027725220,
        -0.016708374, -0.152069092, -0.246505737, -1.048156738,
         0.890090942,  0.069168091,  0.137298584, -0.012115479,
         0.019577026, -0.003051758,  0.001205444,  0.000045776,
    ],
    [
        -0.000137329, -0.002120972,  0.000442505, -0.028533936,
        -0.021179199, -0.151596069, -0.271591187, -1.063217163,
         0.866363525,  0.050354004,  0.133590698, -0.014801025,
         0.018463135, -0.003173828,  0.001113892,  0.000045776,
    ],
    [
        -0.000152588, -0.002243042, -0.000030518, -0.029281616,
        -0.025817871, -0.150497437, -0.297210693, -1.077117920,
         0.841949463,  0.032379150,  0.129562378, -0.017257690,
         0.017349243, -0.003280640,  0.001037598,  0.000030518,
    ],
    [
        -0.000167847, -0.002349854, -0.000549316, -0.029937744,
        -0.030609131, -0.148773193, -0.323318481, -1.089782715,
         0.816864014,  0.015228271,  0.125259399, -0.019531250,
         0.016235352, -0.003372192,  0.000961304,  0.000030518,
    ],
    [
        -0.000198364, -0.002456665, -0.001098633, -0.030532837,
        -0.035552979, -0.146362305, -0.349868774, -1.101211548,
         0.791213989, -0.001068115,  0.120697021, -0.021575928,
         0.015121460, -0.003417969,  0.000885010,  0.000030518,
    ],
    [
        -0.000213623, -0.002578735, -0.001693726, -0.031005859,
        -0.040634155, -0.143264771, -0.376800537, -1.111373901,
         0.765029907, -0.016510010,  0.115921021, -0.023422241,
         0.014022827, -0.003463745,  0.000808716,  0.000030518,
    ],
    [
        -0.000244141, -0.002685547, -0.002334595, -0.031387329,
        -0.045837402, -0.139450073, -0.404083252, -1.120223999,
         0.738372803, -0.031082153,  0.110946655, -0.025085449,
         0.012939453, -0.003479004,  0.000747681,  0.000015259,
    ],
    [
        -0.000259399, -0.002792358, -0.003005981, -0.031661987,
        -0.051132202, -0.134887695, -0.431655884, -1.127746582,
         0.711318970, -0.044784546,  0.105819702, -0.026535034,
         0.011886597, -0.003479004,  0.000686646,  0.000015259,
    ],
    [
        -0.000289917, -0.002899170, -0.003723145, -0.031814575,
        -0.056533813, -0.129577637, -0.459472656, -1.133926392,
         0.683914185, -0.057617188,  0.100540161, -0.027801514,
         0.010848999, -0.003463745,  0.000625610,  0.000015259,
    ],
    [
        -0.000320435, -0.002990723, -0.004486084, -0.031845093,
        -0.061996460, -0.123474121, -0.487472534, -1.138763428,
         0.656219482, -0.069595337,  0.095169067, -0.028884888,
         0.009841919, -0.003433228,  0.000579834,  0.000015259,
    ],
    [
        -0.000366211, -0.003082275, -0.005294800, -0.031738281,
        -0.067520142, -0.116577148, -0.515609741, -1.142211914,
         0.628295898, -0.080688477,  0.089706421, -0.029785156,
         0.008865356, -0.003387451,  0.000534058,  0.000015259,
    ],
    [
        -0.000396729, -0.003173828, -0.006118774, -0.031478882,
        -0.073059082, -0.108856201, -0.543823242, -1.144287109,
         0.600219727, -0.090927124,  0.084182739, -0.030517578,
         0.007919312, -0.003326416,  0.000473022,  0.000015259,
    ],
];

lazy_static! {
    /// Butterfly factors for each stage of the fast DCT. Row `s` holds the factors for a DCT of
    /// length `N = 2^(s + 1)`:
    ///
    /// c[i] = 1.0 / [2.0 * cos((PI / 2N) * (2*i + 1))]    for i = 0..N/2
    static ref DCT_FACTORS: [[f32; 16]; 5] = {
        let mut factors = [[0f32; 16]; 5];

        for (stage, row) in factors.iter_mut().enumerate() {
            let n = 2 << stage;

            for (i, c) in row.iter_mut().take(n / 2).enumerate() {
                let theta = f64::consts::PI * (2 * i + 1) as f64 / (2 * n) as f64;
                *c = (0.5 / theta.cos()) as f32;
            }
        }

        factors
    };
}

/// Performs a Discrete Cosine Transform (DCT-II, unscaled) of the power-of-2 length input `x` using
/// Byeong Gi Lee's recursive algorithm [1].
///
/// [1] B.G. Lee, "A new algorithm to compute the discrete cosine transform", IEEE Transactions
/// on Acoustics, Speech, and Signal Processing, vol. 32, no. 6, pp. 1243-1245, 1984.
fn dct(x: &[f32], y: &mut [f32]) {
    let n = x.len();

    if n == 1 {
        y[0] = x[0];
        return;
    }

    let half = n / 2;
    let factors = &DCT_FACTORS[n.trailing_zeros() as usize - 1];

    let mut even = [0f32; 16];
    let mut odd = [0f32; 16];

    for i in 0..half {
        let a = x[i];
        let b = x[n - 1 - i];

        even[i] = a + b;
        odd[i] = (a - b) * factors[i];
    }

    let mut even_out = [0f32; 16];
    let mut odd_out = [0f32; 16];

    dct(&even[..half], &mut even_out[..half]);
    dct(&odd[..half], &mut odd_out[..half]);

    for k in 0..half {
        y[2 * k] = even_out[k];
    }

    for k in 0..half - 1 {
        y[2 * k + 1] = odd_out[k] + odd_out[k + 1];
    }

    y[n - 1] = odd_out[half - 1];
}

/// `SynthesisState` maintains the persistant state of sub-band synthesis for one channel.
///
/// The 16 most recent 64-sample matrixing outputs (V vectors) are kept in two ping-pong buffers of
/// 32 rows by 16 taps. Only the first half of the newest V vector is needed in the active buffer,
/// and only the second half in the other. After each block the buffers swap roles, so the active
/// buffer always alternates first and second halves of successively older V vectors. Each row
/// is a circular history indexed by `pos`.
pub struct SynthesisState {
    v: [[f32; 512]; 2],
    active: usize,
    pos: usize,
}

impl Default for SynthesisState {
    fn default() -> Self {
        SynthesisState { v: [[0f32; 512]; 2], active: 0, pos: 0 }
    }
}

impl SynthesisState {
    /// Clears the synthesis history.
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// Gets the current write position.
    #[cfg(test)]
    pub fn write_position(&self) -> usize {
        self.pos
    }

    /// Synthesizes one block of 32 PCM samples from one sample of each of the 32 sub-bands.
    fn synthesize_block(&mut self, input: &[f32; 32], out: &mut [f32; SUBBAND_BLOCK_LEN]) {
        // Matrixing. Points [16..48) of the 64-point matrixing output map onto a 32-point DCT of
        // the input. The remaining points are copies or negations of those.
        //
        //   V[ 0..16] =  y[16..32]
        //   V[16]     =  0
        //   V[17..32] = -y[31..16]
        //   V[32..48] = -y[16..0]
        //   V[48..64] = -y[0..16]
        let mut y = [0f32; 32];
        dct(input, &mut y);

        let pos = self.pos;
        let (front, back) = if self.active == 0 {
            let (a, b) = self.v.split_at_mut(1);
            (&mut a[0], &mut b[0])
        }
        else {
            let (a, b) = self.v.split_at_mut(1);
            (&mut b[0], &mut a[0])
        };

        // First half into the active buffer.
        for k in 0..16 {
            front[16 * k + pos] = y[16 + k];
        }
        front[16 * 16 + pos] = 0.0;
        for k in 17..32 {
            front[16 * k + pos] = -y[48 - k];
        }

        // Second half into the other buffer.
        for k in 0..17 {
            back[16 * k + pos] = -y[16 - k];
        }
        for k in 17..32 {
            back[16 * k + pos] = -y[k - 16];
        }

        // Windowing. Tap t of each output sample is taken from the V vector written t blocks ago.
        for (i, (o, window)) in out.iter_mut().zip(SYNTHESIS_D16.iter()).enumerate() {
            let row = &front[16 * i..16 * i + 16];

            let mut sum = 0.0;
            for (t, d) in window.iter().enumerate() {
                sum += row[(pos + 16 - t) & 0xf] * d;
            }

            *o = OUTPUT_SCALE * sum;
        }

        self.pos = (pos + 1) & 0xf;
        self.active ^= 1;
    }
}

/// Sub-band synthesis transforms 32 sub-band blocks containing `n_frames` time-domain samples each
/// into `n_frames` blocks of 32 PCM audio samples that are appended to `channel` of the sink.
///
/// Sample `b` of sub-band `sb` is `in_samples[n_frames * sb + b]`. Each sub-band sample is scaled
/// by the band's equalizer factor before synthesis.
pub fn synthesis(
    state: &mut SynthesisState,
    n_frames: usize,
    in_samples: &[f32],
    eq: &[f32; 32],
    channel: usize,
    sink: &mut dyn OutputSink,
) {
    assert!(in_samples.len() >= 32 * n_frames);

    let mut s_vec = [0f32; 32];
    let mut pcm = [0f32; SUBBAND_BLOCK_LEN];

    for b in 0..n_frames {
        for sb in 0..32 {
            s_vec[sb] = eq[sb] * in_samples[n_frames * sb + b];
        }

        state.synthesize_block(&s_vec, &mut pcm);

        sink.append_samples(channel, &pcm);
    }
}

/// Synthesizes each decoded channel selected for output. `channels[ch]` holds the sub-band samples
/// of channel `ch` laid out as for [`synthesis`].
pub fn synthesis_channels(
    states: &mut [SynthesisState; 2],
    n_frames: usize,
    channels: [&[f32]; 2],
    n_channels: usize,
    ctx: &mut DecodeContext<'_>,
) {
    let sources = ctx.output_channels.source_channels(n_channels);

    for (out_ch, &ch) in sources.iter().enumerate() {
        synthesis(&mut states[ch], n_frames, channels[ch], ctx.eq, out_ch, &mut *ctx.sink);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cadence_core::audio::SampleBuffer;

    const UNITY: [f32; 32] = [1.0; 32];

    fn dct32_analytical(x: &[f32; 32]) -> [f32; 32] {
        const PI_32: f64 = f64::consts::PI / 32.0;

        let mut result = [0f32; 32];
        for (i, item) in result.iter_mut().enumerate() {
            *item = x
                .iter()
                .enumerate()
                .map(|(j, &jtem)| jtem * (PI_32 * (i as f64) * ((j as f64) + 0.5)).cos() as f32)
                .sum();
        }

        result
    }

    /// Direct evaluation of the synthesis filterbank as written in ISO/IEC 11172-3, figure A.2.
    pub(crate) struct ReferenceSynthesis {
        v: Vec<f64>,
    }

    impl ReferenceSynthesis {
        pub(crate) fn new() -> Self {
            ReferenceSynthesis { v: vec![0.0; 1024] }
        }

        fn window(n: usize) -> f64 {
            f64::from(SYNTHESIS_D16[n % 32][n / 32])
        }

        pub(crate) fn synthesize(&mut self, s: &[f32; 32]) -> [f32; 32] {
            self.v.rotate_right(64);

            for i in 0..64 {
                self.v[i] = (0..32)
                    .map(|k| {
                        let n = ((16 + i) * (2 * k + 1)) as f64 * f64::consts::PI / 64.0;
                        n.cos() * f64::from(s[k])
                    })
                    .sum();
            }

            let mut u = [0f64; 512];
            for i in 0..8 {
                for j in 0..32 {
                    u[64 * i + j] = self.v[128 * i + j];
                    u[64 * i + 32 + j] = self.v[128 * i + 96 + j];
                }
            }

            let mut out = [0f32; 32];
            for (j, o) in out.iter_mut().enumerate() {
                let sum: f64 = (0..16).map(|i| u[32 * i + j] * Self::window(32 * i + j)).sum();
                *o = (f64::from(OUTPUT_SCALE) * sum) as f32;
            }
            out
        }
    }

    #[test]
    fn verify_dct32() {
        const TEST_VECTOR: [f32; 32] = [
            0.1710, 0.1705, 0.3476, 0.1866, 0.4784, 0.6525, 0.2690, 0.9996, //
            0.1864, 0.7277, 0.1163, 0.6620, 0.0911, 0.3225, 0.1126, 0.5344, //
            0.7839, 0.9741, 0.8757, 0.5763, 0.5926, 0.2756, 0.1757, 0.6531, //
            0.7101, 0.7376, 0.1924, 0.0351, 0.8044, 0.2409, 0.9347, 0.9417, //
        ];

        let mut test_result = [0f32; 32];
        dct(&TEST_VECTOR, &mut test_result);

        let actual_result = dct32_analytical(&TEST_VECTOR);
        for i in 0..32 {
            assert!((actual_result[i] - test_result[i]).abs() < 0.0001);
        }
    }

    #[test]
    fn verify_synthesis_matches_reference() {
        let mut state = SynthesisState::default();
        let mut reference = ReferenceSynthesis::new();
        let mut out = [0f32; 32];

        // Enough blocks to cycle the history more than once.
        for b in 0..40 {
            let mut input = [0f32; 32];
            for (sb, s) in input.iter_mut().enumerate() {
                *s = (((b * 7 + sb * 13) % 17) as f32 - 8.0) / 16.0;
            }

            state.synthesize_block(&input, &mut out);
            let expected = reference.synthesize(&input);

            // Within one 16-bit step.
            for (a, e) in out.iter().zip(expected.iter()) {
                assert!((a - e).abs() < 1.0, "{} != {}", a, e);
            }
        }

        assert_eq!(state.write_position(), 40 % 16);
    }

    #[test]
    fn verify_synthesis_silence_and_reset() {
        let mut state = SynthesisState::default();
        let mut sink = SampleBuffer::new(44_100, 1);

        let mut samples = [0f32; 32 * 18];
        synthesis(&mut state, 18, &samples, &UNITY, 0, &mut sink);

        assert_eq!(sink.frames(), 18 * 32);
        assert!(sink.samples().iter().all(|&s| s == 0));

        // A DC impulse in the lowest band produces output.
        samples[0] = 0.5;
        sink.clear();
        synthesis(&mut state, 18, &samples, &UNITY, 0, &mut sink);
        assert!(sink.samples().iter().any(|&s| s != 0));

        // A zero equalizer factor silences the band.
        state.reset();
        sink.clear();
        let mut eq = UNITY;
        eq[0] = 0.0;
        synthesis(&mut state, 18, &samples, &eq, 0, &mut sink);
        assert!(sink.samples().iter().all(|&s| s == 0));
    }
}
