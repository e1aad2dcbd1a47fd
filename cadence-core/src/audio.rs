// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides the output interface of the decoders and the buffers that
//! implement it.

use std::cmp;

use bitflags::bitflags;

use crate::util::clamp::clamp_pcm_f32_to_i16;

/// The maximum number of channels a MPEG audio decoder outputs.
pub const MAX_CHANNELS: usize = 2;

/// The maximum number of samples per channel in one decoded frame.
pub const MAX_FRAME_SAMPLES: usize = 1152;

/// The number of samples delivered to a sink per call.
pub const SUBBAND_BLOCK_LEN: usize = 32;

bitflags! {
    /// A bitmask representing positional audio channels.
    ///
    /// The positions are identical to those of the channel mask in Microsoft's
    /// `WAVEFORMATEXTENSIBLE` structure.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Channels: u32 {
        /// Front-left (left) or the Mono channel.
        const FRONT_LEFT  = 1 << 0;
        /// Front-right (right) channel.
        const FRONT_RIGHT = 1 << 1;
    }
}

impl Channels {
    /// Gets the number of channels.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

/// An `OutputSink` receives the PCM samples produced by a decoder.
///
/// Samples are delivered in blocks of 32 per channel, already scaled to 16-bit full scale. For
/// every frame the decoder calls `clear` once, then `append_samples` for each block of each
/// channel in time order, then `flush_frame` once.
pub trait OutputSink {
    /// Appends a block of 32 samples to `channel`.
    fn append_samples(&mut self, channel: usize, samples: &[f32; SUBBAND_BLOCK_LEN]);

    /// Discards all samples appended since the last flush.
    fn clear(&mut self);

    /// Marks the end of a decoded frame.
    fn flush_frame(&mut self);
}

/// A `SampleBuffer` collects a frame of decoded samples as interleaved signed 16-bit integers.
pub struct SampleBuffer {
    buf: Box<[i16]>,
    /// The next write index for each channel.
    write_pos: [usize; MAX_CHANNELS],
    n_channels: usize,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Instantiate a new `SampleBuffer` for `n_channels` channels, which must be 1 or 2.
    pub fn new(sample_rate: u32, n_channels: usize) -> Self {
        assert!(n_channels >= 1 && n_channels <= MAX_CHANNELS);

        SampleBuffer {
            buf: vec![0; MAX_CHANNELS * MAX_FRAME_SAMPLES].into_boxed_slice(),
            write_pos: [0, 1],
            n_channels,
            sample_rate,
        }
    }

    /// Gets the number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.n_channels
    }

    /// Gets the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the interleaved samples written so far. The length is governed by the first channel.
    pub fn samples(&self) -> &[i16] {
        &self.buf[..self.write_pos[0]]
    }

    /// Gets the number of samples per channel written so far.
    pub fn frames(&self) -> usize {
        self.write_pos[0] / self.n_channels
    }
}

impl OutputSink for SampleBuffer {
    fn append_samples(&mut self, channel: usize, samples: &[f32; SUBBAND_BLOCK_LEN]) {
        if channel >= self.n_channels {
            return;
        }

        let mut pos = self.write_pos[channel];

        for &sample in samples {
            self.buf[pos] = clamp_pcm_f32_to_i16(sample);
            pos += self.n_channels;
        }

        self.write_pos[channel] = pos;
    }

    fn clear(&mut self) {
        self.write_pos = [0, 1];
    }

    fn flush_frame(&mut self) {}
}

/// A `PcmBuffer` collects a frame of decoded samples as interleaved stereo little-endian 16-bit
/// bytes, and lets them be read out incrementally.
///
/// Mono content may be doubled into both output channels. Reads always return whole stereo
/// sample frames (4 bytes) unless the final partial frame of the buffer is all that remains.
pub struct PcmBuffer {
    buf: Box<[u8]>,
    /// The next write offset for each channel.
    write_pos: [usize; MAX_CHANNELS],
    /// The read offset.
    read_pos: usize,
    /// The end of the readable region, set when a frame is flushed.
    end: usize,
    double_mono: bool,
}

impl PcmBuffer {
    const BYTES_PER_FRAME: usize = 2 * MAX_CHANNELS;

    pub fn new() -> Self {
        PcmBuffer {
            buf: vec![0; MAX_FRAME_SAMPLES * Self::BYTES_PER_FRAME].into_boxed_slice(),
            write_pos: [0, 2],
            read_pos: 0,
            end: 0,
            double_mono: false,
        }
    }

    /// Sets if frames carrying only the first channel have it copied into the second output
    /// channel.
    pub fn set_double_mono(&mut self, double_mono: bool) {
        self.double_mono = double_mono;
    }

    /// Gets the number of bytes left to read.
    pub fn bytes_left(&self) -> usize {
        self.end - self.read_pos
    }

    /// Copies buffered bytes into `out` and returns the number of bytes copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let remaining = self.bytes_left();

        let len = if out.len() > remaining {
            remaining
        }
        else {
            out.len() - out.len() % Self::BYTES_PER_FRAME
        };

        out[..len].copy_from_slice(&self.buf[self.read_pos..self.read_pos + len]);
        self.read_pos += len;

        len
    }
}

impl Default for PcmBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for PcmBuffer {
    fn append_samples(&mut self, channel: usize, samples: &[f32; SUBBAND_BLOCK_LEN]) {
        if channel >= MAX_CHANNELS {
            return;
        }

        let mut pos = self.write_pos[channel];

        for &sample in samples {
            let bytes = clamp_pcm_f32_to_i16(sample).to_le_bytes();

            self.buf[pos..pos + 2].copy_from_slice(&bytes);
            pos += Self::BYTES_PER_FRAME;
        }

        self.write_pos[channel] = pos;
    }

    fn clear(&mut self) {
        self.write_pos = [0, 2];
        self.read_pos = 0;
        self.end = 0;
    }

    fn flush_frame(&mut self) {
        if self.double_mono && self.write_pos[1] == 2 {
            for frame in self.buf[..self.write_pos[0]].chunks_exact_mut(Self::BYTES_PER_FRAME) {
                frame.copy_within(0..2, 2);
            }
            self.write_pos[1] = self.write_pos[0] + 2;
        }

        self.read_pos = 0;
        self.end = cmp::max(self.write_pos[0], self.write_pos[1] - 2);
    }
}
