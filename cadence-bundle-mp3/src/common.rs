// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadence_core::audio::{Channels, OutputSink};
use cadence_core::checksum::Crc16Ansi;
use cadence_core::errors::{decode_error, Result};

use lazy_static::lazy_static;
use log::warn;

use crate::reader::Frame;

/// The number of audio samples per granule.
pub const SAMPLES_PER_GRANULE: usize = 576;

/// Starting indicies of each scale factor band at various sampling rates for long blocks.
#[rustfmt::skip]
pub const SFB_LONG_BANDS: [[usize; 23]; 9] = [
    // 44.1 kHz, MPEG version 1, ISO/IEC 11172-3 Table B.8
    [0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 52, 62, 74, 90, 110, 134, 162, 196, 238, 288, 342, 418, 576],
    // 48 kHz
    [0, 4, 8, 12, 16, 20, 24, 30, 36, 42, 50, 60, 72, 88, 106, 128, 156, 190, 230, 276, 330, 384, 576],
    // 32 kHz
    [0, 4, 8, 12, 16, 20, 24, 30, 36, 44, 54, 66, 82, 102, 126, 156, 194, 240, 296, 364, 448, 550, 576],
    // 22.05 kHz, MPEG version 2, ISO/IEC 13818-3 Table B.2
    [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 116, 140, 168, 200, 238, 284, 336, 396, 464, 522, 576],
    // 24 kHz
    [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 114, 136, 162, 194, 232, 278, 332, 394, 464, 540, 576],
    // 16 kHz
    [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 116, 140, 168, 200, 238, 284, 336, 396, 464, 522, 576],
    // 11.025 kHz, MPEG version 2.5
    [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 116, 140, 168, 200, 238, 284, 336, 396, 464, 522, 576],
    // 12 kHz
    [0, 6, 12, 18, 24, 30, 36, 44, 54, 66, 80, 96, 116, 140, 168, 200, 238, 284, 336, 396, 464, 522, 576],
    // 8 kHz
    [0, 12, 24, 36, 48, 60, 72, 88, 108, 132, 160, 192, 232, 280, 336, 400, 476, 566, 568, 570, 572, 574, 576],
];

/// Starting indicies of each scale factor band within a single short window (192 samples) at
/// various sampling rates.
#[rustfmt::skip]
pub const SFB_SHORT_WINDOW_BANDS: [[usize; 14]; 9] = [
    [0, 4, 8, 12, 16, 22, 30, 40, 52, 66,  84, 106, 136, 192],
    [0, 4, 8, 12, 16, 22, 28, 38, 50, 64,  80, 100, 126, 192],
    [0, 4, 8, 12, 16, 22, 30, 42, 58, 78, 104, 138, 180, 192],
    [0, 4, 8, 12, 18, 24, 32, 42, 56, 74, 100, 132, 174, 192],
    [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 136, 180, 192],
    [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    [0, 4, 8, 12, 18, 26, 36, 48, 62, 80, 104, 134, 174, 192],
    [0, 8, 16, 24, 36, 52, 72, 96, 124, 160, 162, 164, 166, 192],
];

/// The first short scale factor band of a mixed block.
pub const MIXED_FIRST_SHORT_BAND: usize = 3;

lazy_static! {
    /// Starting indicies of each window of each short scale factor band as laid out in the
    /// bitstream. Short blocks are coded band by band with the three windows of a band stored
    /// consecutively, so entry `3 * sfb + win` is the first sample of window `win` of band `sfb`.
    pub static ref SFB_SHORT_BANDS: [[usize; 40]; 9] = {
        let mut bands = [[0; 40]; 9];

        for (interleaved, window) in bands.iter_mut().zip(SFB_SHORT_WINDOW_BANDS.iter()) {
            for sfb in 0..13 {
                let width = window[sfb + 1] - window[sfb];

                for win in 0..3 {
                    interleaved[3 * sfb + win] = 3 * window[sfb] + win * width;
                }
            }
            interleaved[39] = SAMPLES_PER_GRANULE;
        }

        bands
    };
}

/// The MPEG audio version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MpegVersion {
    /// Version 2.5
    Mpeg2p5,
    /// Version 2
    Mpeg2,
    /// Version 1
    Mpeg1,
}

/// The MPEG audio layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MpegLayer {
    /// Layer 1
    Layer1,
    /// Layer 2
    Layer2,
    /// Layer 3
    Layer3,
}

/// For Joint Stereo channel mode, the mode extension describes the features and parameters of the
/// stereo encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Joint Stereo in layer 3 may use both Mid-Side and Intensity encoding.
    Layer3 { mid_side: bool, intensity: bool },
    /// Joint Stereo in layers 1 and 2 may only use Intensity encoding on a set of bands. The range
    /// of bands using intensity encoding is bound..32.
    Intensity { bound: u32 },
}

/// The channel mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// Single mono audio channel.
    Mono,
    /// Dual mono audio channels.
    DualMono,
    /// Stereo channels.
    Stereo,
    /// Joint Stereo encoded channels (decodes to Stereo).
    JointStereo(Mode),
}

impl ChannelMode {
    /// Gets the number of channels.
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }

    /// Gets the the channel map.
    #[inline(always)]
    pub fn channels(&self) -> Channels {
        match self {
            ChannelMode::Mono => Channels::FRONT_LEFT,
            _ => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        }
    }
}

/// The emphasis applied during encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Emphasis {
    /// No emphasis
    None,
    /// 50/15us
    Fifty15,
    /// CCIT J.17
    CcitJ17,
}

/// A MPEG 1, 2, or 2.5 audio frame header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub bitrate: u32,
    /// The raw 4-bit bitrate index.
    pub bitrate_idx: u32,
    pub sample_rate: u32,
    pub sample_rate_idx: usize,
    pub channel_mode: ChannelMode,
    /// The raw 2-bit mode extension.
    pub mode_extension: u32,
    pub emphasis: Emphasis,
    pub is_copyrighted: bool,
    pub is_original: bool,
    pub has_padding: bool,
    pub has_crc: bool,
    /// The frame size in bytes, excluding the 4 byte header.
    pub frame_size: usize,
}

impl FrameHeader {
    /// Returns true if this a MPEG1 frame, false otherwise.
    #[inline(always)]
    pub fn is_mpeg1(&self) -> bool {
        self.version == MpegVersion::Mpeg1
    }

    /// Returns true if this a MPEG2.5 frame, false otherwise.
    #[inline(always)]
    pub fn is_mpeg2p5(&self) -> bool {
        self.version == MpegVersion::Mpeg2p5
    }

    /// Returns the number of granules in the frame.
    #[inline(always)]
    pub fn n_granules(&self) -> usize {
        match self.version {
            MpegVersion::Mpeg1 => 2,
            _ => 1,
        }
    }

    /// Returns the number of channels per granule.
    #[inline(always)]
    pub fn n_channels(&self) -> usize {
        self.channel_mode.count()
    }

    /// Gets the channel map.
    pub fn channels(&self) -> Channels {
        self.channel_mode.channels()
    }

    /// Returns true if Intensity Stereo encoding is used, false otherwise.
    #[inline(always)]
    pub fn is_intensity_stereo(&self) -> bool {
        match self.channel_mode {
            ChannelMode::JointStereo(Mode::Intensity { .. }) => true,
            ChannelMode::JointStereo(Mode::Layer3 { intensity, .. }) => intensity,
            _ => false,
        }
    }

    /// Get the side information length.
    #[inline(always)]
    pub fn side_info_len(&self) -> usize {
        match (self.version, self.channel_mode) {
            (MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
            (MpegVersion::Mpeg1, _) => 32,
            (_, ChannelMode::Mono) => 9,
            (_, _) => 17,
        }
    }

    /// Gets the number of Layer III main data bytes ("slots") carried by the frame.
    pub fn main_data_len(&self) -> usize {
        let crc_len = if self.has_crc { 2 } else { 0 };
        self.frame_size.saturating_sub(self.side_info_len() + crc_len)
    }

    /// Gets the number of samples per channel a decoded frame yields.
    pub fn samples_per_frame(&self) -> usize {
        match self.layer {
            MpegLayer::Layer1 => 384,
            MpegLayer::Layer2 => 1152,
            MpegLayer::Layer3 => SAMPLES_PER_GRANULE * self.n_granules(),
        }
    }

    /// Gets the duration of the frame in milliseconds.
    pub fn ms_per_frame(&self) -> f64 {
        1000.0 * self.samples_per_frame() as f64 / f64::from(self.sample_rate)
    }
}

/// The Layer III block type of a granule channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockType {
    // Default case when window switching is off. Also the normal case when window switching is
    // on. Granule contains one long block.
    Long,
    Start,
    Short { is_mixed: bool },
    End,
}

/// Selects which decoded channels are delivered to the output sink.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputChannels {
    /// Both channels, or the single channel of a mono stream.
    #[default]
    Both,
    /// Only the left channel.
    Left,
    /// Only the right channel. Mono streams output their single channel.
    Right,
    /// The average of both channels.
    Downmix,
}

impl OutputChannels {
    /// Gets the output channel selection for an integer code: 0 for both, 1 for left, 2 for right,
    /// and 3 for downmix.
    pub fn from_code(code: i32) -> Option<OutputChannels> {
        match code {
            0 => Some(OutputChannels::Both),
            1 => Some(OutputChannels::Left),
            2 => Some(OutputChannels::Right),
            3 => Some(OutputChannels::Downmix),
            _ => None,
        }
    }

    /// Gets the number of output channels for a stereo stream.
    pub fn channel_count(&self) -> usize {
        match self {
            OutputChannels::Both => 2,
            _ => 1,
        }
    }

    /// Gets the decoded channel feeding each output channel, in output channel order.
    pub fn source_channels(&self, n_channels: usize) -> &'static [usize] {
        match (self, n_channels) {
            (OutputChannels::Both, 2) => &[0, 1],
            (OutputChannels::Right, 2) => &[1],
            _ => &[0],
        }
    }
}

/// The per-frame environment a layer decodes into.
pub struct DecodeContext<'a> {
    /// Receives the synthesized PCM samples.
    pub sink: &'a mut dyn OutputSink,
    /// The linear gain of each sub-band.
    pub eq: &'a [f32; 32],
    pub output_channels: OutputChannels,
    /// Reject frames failing the CRC check.
    pub verify_crc: bool,
}

/// The outcome of decoding a frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStatus {
    /// The frame did not produce samples.
    pub skipped: bool,
    /// The frame failed its CRC check.
    pub crc_mismatch: bool,
}

/// A decoder for one MPEG audio layer.
pub trait Layer {
    /// Decodes the audio data of a frame and writes the synthesized PCM samples to the sink.
    fn decode(&mut self, frame: &Frame<'_>, ctx: &mut DecodeContext<'_>) -> Result<FrameStatus>;

    /// Clears all state carried between frames.
    fn reset(&mut self);
}

/// Instantiates a CRC covering the protected 16 bits of the frame header.
pub fn header_crc(header_word: u32) -> Crc16Ansi {
    let mut crc = Crc16Ansi::new(0xffff);
    crc.process_bits(header_word & 0xffff, 16);
    crc
}

/// Compares the CRC computed over the protected bits of a frame against the CRC stored in the
/// frame. Returns true on a mismatch, or an error if mismatches are rejected.
pub fn check_crc(expected: u16, crc: &Crc16Ansi, verify: bool) -> Result<bool> {
    if crc.crc() == expected {
        return Ok(false);
    }

    warn!("mpa: crc mismatch (stored {:#06x}, computed {:#06x})", expected, crc.crc());

    if verify {
        return decode_error("mpa: crc mismatch");
    }

    Ok(true)
}
