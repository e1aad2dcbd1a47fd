// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;
use std::io::{Read, Seek, SeekFrom};

use cadence_core::audio::{OutputSink, PcmBuffer};
use cadence_core::errors::{end_of_stream_error, Error, Result};

use log::debug;

use crate::decoder::{Decoder, DecoderOptions, FrameInfo};

/// `Mp3Stream` is a pull-style PCM stream over a MPEG audio elementary stream.
///
/// Reading yields interleaved little-endian 16-bit stereo PCM. Mono streams, and stereo streams
/// with a single output channel selected, are doubled into both channels. Frames are decoded on
/// demand, one at a time. Reads return whole sample frames, except when the output is too small
/// to hold one: the sample frame is then staged and returned over as many reads as needed.
pub struct Mp3Stream<R: Read> {
    decoder: Decoder<R>,
    buf: PcmBuffer,
    /// A sample frame being returned in pieces.
    staged: [u8; 4],
    staged_pos: usize,
    staged_len: usize,
    sample_rate: u32,
    channels: usize,
    is_eof: bool,
}

impl<R: Read> Mp3Stream<R> {
    /// Instantiates a stream with the default decoder options.
    ///
    /// The first frame is decoded to determine the stream parameters. If the stream contains no
    /// frames, an end of stream error is returned.
    pub fn new(inner: R) -> Result<Self> {
        Self::with_options(inner, &Default::default())
    }

    /// Instantiates a stream with the provided decoder options.
    pub fn with_options(inner: R, options: &DecoderOptions) -> Result<Self> {
        let mut buf = PcmBuffer::new();
        buf.set_double_mono(true);

        let mut stream = Mp3Stream {
            decoder: Decoder::new(inner, options),
            buf,
            staged: [0; 4],
            staged_pos: 0,
            staged_len: 0,
            sample_rate: 0,
            channels: 0,
            is_eof: false,
        };

        if !stream.read_frame()? {
            return end_of_stream_error();
        }

        Ok(stream)
    }

    /// Gets the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the number of channels in the source stream.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns true once all frames have been decoded and read.
    pub fn is_eof(&self) -> bool {
        self.is_eof && self.staged_pos == self.staged_len
    }

    /// Gets a reference to the underlying frame decoder.
    pub fn decoder(&self) -> &Decoder<R> {
        &self.decoder
    }

    /// Decodes up to `n_frames` frames, discarding their samples, and returns the number of frames
    /// decoded.
    pub fn decode_frames(&mut self, n_frames: usize) -> Result<usize> {
        let mut n_decoded = 0;

        while n_decoded < n_frames && self.read_frame()? {
            n_decoded += 1;
        }

        Ok(n_decoded)
    }

    /// Decodes the next frame into the PCM buffer. Returns false at the end of the stream.
    fn read_frame(&mut self) -> Result<bool> {
        match self.decoder.decode_frame(&mut self.buf)? {
            Some(info) => {
                self.update_params(&info);
                Ok(true)
            }
            None => {
                self.is_eof = true;
                Ok(false)
            }
        }
    }

    /// Copies as much of the staged sample frame as fits into `out`.
    fn read_staged(&mut self, out: &mut [u8]) -> usize {
        let len = cmp::min(out.len(), self.staged_len - self.staged_pos);

        out[..len].copy_from_slice(&self.staged[self.staged_pos..self.staged_pos + len]);
        self.staged_pos += len;

        len
    }

    fn update_params(&mut self, info: &FrameInfo) {
        if self.sample_rate != info.header.sample_rate || self.channels != info.header.n_channels()
        {
            debug!(
                "mpa: stream parameters {} Hz, {} channels",
                info.header.sample_rate,
                info.header.n_channels()
            );

            self.sample_rate = info.header.sample_rate;
            self.channels = info.header.n_channels();
        }
    }
}

impl<R: Read + Seek> Mp3Stream<R> {
    /// Seeks the source stream, flushing all buffered samples and decoder state.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let pos = self.decoder.seek(pos)?;

        self.buf.clear();
        self.staged_pos = 0;
        self.staged_len = 0;
        self.is_eof = false;

        Ok(pos)
    }

    /// Rewinds the stream to the beginning.
    pub fn reset(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl<R: Read> Read for Mp3Stream<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut len = self.read_staged(out);

        while len < out.len() && !self.is_eof {
            if self.buf.bytes_left() == 0 {
                let is_frame = self.read_frame().map_err(|err| match err {
                    Error::IoError(err) => err,
                    err => io::Error::new(io::ErrorKind::InvalidData, err),
                })?;

                if !is_frame {
                    break;
                }

                continue;
            }

            let read = self.buf.read(&mut out[len..]);

            if read == 0 {
                // The remaining output cannot hold a whole sample frame. Stage the next one and
                // return the part that fits.
                self.staged_len = self.buf.read(&mut self.staged);
                self.staged_pos = 0;

                len += self.read_staged(&mut out[len..]);
                break;
            }

            len += read;
        }

        Ok(len)
    }
}
