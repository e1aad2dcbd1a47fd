// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Seek, SeekFrom};

use cadence_core::audio::OutputSink;
use cadence_core::errors::{decode_error, Error, Result};

#[cfg(not(all(feature = "mp1", feature = "mp2", feature = "mp3")))]
use cadence_core::errors::unsupported_error;

use log::{info, warn};

use crate::common::*;
use crate::equalizer::{Equalizer, EQ_BANDS};
use crate::header::SyncMode;
use crate::reader::{Frame, FrameReader};

#[cfg(feature = "mp1")]
use crate::layer1::Layer1;
#[cfg(feature = "mp2")]
use crate::layer2::Layer2;
#[cfg(feature = "mp3")]
use crate::layer3::Layer3;

/// `DecoderOptions` is a common set of options that all decoders use.
#[derive(Copy, Clone, Debug, Default)]
pub struct DecoderOptions {
    /// The equalizer applied to the sub-band samples. No equalizer passes all bands unchanged.
    pub equalizer: Option<Equalizer>,
    /// The decoded channels to output.
    pub output_channels: OutputChannels,
    /// Reject frames failing their CRC check as corrupt. Otherwise, a CRC mismatch is only
    /// reported.
    pub verify_crc: bool,
}

/// Information about a decoded frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// The header of the frame.
    pub header: FrameHeader,
    /// The number of channels written to the output sink.
    pub channels: usize,
    /// The frame did not produce any samples because its main data was not available.
    pub skipped: bool,
    /// The frame failed its CRC check.
    pub crc_mismatch: bool,
}

impl FrameInfo {
    /// Gets the number of samples per channel written to the output sink.
    pub fn samples(&self) -> usize {
        if self.skipped {
            0
        }
        else {
            self.header.samples_per_frame()
        }
    }
}

/// MPEG1, MPEG2, and MPEG2.5 Layer 1, 2, and 3 decoder.
///
/// `MpaDecoder` decodes synchronized frames one at a time. It holds all state carried between
/// frames: the Layer III bit reservoir and overlap buffers, and the synthesis filterbanks.
pub struct MpaDecoder {
    options: DecoderOptions,
    eq: [f32; EQ_BANDS],
    #[cfg(feature = "mp1")]
    layer1: Layer1,
    #[cfg(feature = "mp2")]
    layer2: Layer2,
    #[cfg(feature = "mp3")]
    layer3: Box<Layer3>,
}

impl MpaDecoder {
    pub fn new(options: &DecoderOptions) -> Self {
        let eq = match options.equalizer {
            Some(ref equalizer) => equalizer.band_factors(),
            None => [1.0; EQ_BANDS],
        };

        MpaDecoder {
            options: *options,
            eq,
            #[cfg(feature = "mp1")]
            layer1: Layer1::new(),
            #[cfg(feature = "mp2")]
            layer2: Layer2::new(),
            #[cfg(feature = "mp3")]
            layer3: Box::new(Layer3::new()),
        }
    }

    /// Gets the options the decoder was instantiated with.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Gets the number of channels the decoder outputs for a frame.
    pub fn output_channel_count(&self, header: &FrameHeader) -> usize {
        match header.n_channels() {
            1 => 1,
            _ => self.options.output_channels.channel_count(),
        }
    }

    /// Decodes a frame into the output sink. The sink is cleared before decoding, and flushed once
    /// the frame is decoded. On error, the sink is left empty.
    pub fn decode(&mut self, frame: &Frame<'_>, sink: &mut dyn OutputSink) -> Result<FrameStatus> {
        sink.clear();

        let result = self.decode_inner(frame, sink);

        if result.is_ok() {
            sink.flush_frame();
        }
        else {
            sink.clear();
        }

        match result {
            // The frame body is in memory, therefore any IO error is caused by reading past the
            // end of the frame data.
            Err(Error::IoError(_)) => decode_error("mpa: frame data overrun"),
            result => result,
        }
    }

    fn decode_inner(
        &mut self,
        frame: &Frame<'_>,
        sink: &mut dyn OutputSink,
    ) -> Result<FrameStatus> {
        let mut ctx = DecodeContext {
            sink,
            eq: &self.eq,
            output_channels: self.options.output_channels,
            verify_crc: self.options.verify_crc,
        };

        // Choose the decode step based on the MPEG layer.
        match frame.header.layer {
            #[cfg(feature = "mp1")]
            MpegLayer::Layer1 => self.layer1.decode(frame, &mut ctx),
            #[cfg(not(feature = "mp1"))]
            MpegLayer::Layer1 => unsupported_error("mpa: layer 1 decoding is not enabled"),
            #[cfg(feature = "mp2")]
            MpegLayer::Layer2 => self.layer2.decode(frame, &mut ctx),
            #[cfg(not(feature = "mp2"))]
            MpegLayer::Layer2 => unsupported_error("mpa: layer 2 decoding is not enabled"),
            #[cfg(feature = "mp3")]
            MpegLayer::Layer3 => self.layer3.decode(frame, &mut ctx),
            #[cfg(not(feature = "mp3"))]
            MpegLayer::Layer3 => unsupported_error("mpa: layer 3 decoding is not enabled"),
        }
    }

    /// Clears all state carried between frames. Must be called after repositioning the stream.
    pub fn reset(&mut self) {
        #[cfg(feature = "mp1")]
        self.layer1.reset();
        #[cfg(feature = "mp2")]
        self.layer2.reset();
        #[cfg(feature = "mp3")]
        self.layer3.reset();
    }
}

/// `Decoder` reads MPEG audio frames from a byte stream and decodes them.
///
/// Frames that fail to decode are skipped, and decoding resumes with the next frame. IO errors
/// are fatal.
pub struct Decoder<R: Read> {
    reader: FrameReader<R>,
    decoder: MpaDecoder,
    first_header: Option<FrameHeader>,
    n_decoded: u64,
    n_skipped: u64,
    n_rejected: u64,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R, options: &DecoderOptions) -> Self {
        Decoder {
            reader: FrameReader::new(inner),
            decoder: MpaDecoder::new(options),
            first_header: None,
            n_decoded: 0,
            n_skipped: 0,
            n_rejected: 0,
        }
    }

    /// Decodes the next frame into the output sink. Returns `Ok(None)` at the end of the stream.
    pub fn decode_frame(&mut self, sink: &mut dyn OutputSink) -> Result<Option<FrameInfo>> {
        loop {
            let frame = match self.reader.next_frame()? {
                Some(frame) => frame,
                None => return Ok(None),
            };

            if self.first_header.is_none() {
                let header = &frame.header;

                info!(
                    "mpa: {:?} {:?}, {} Hz, {:?}, {} kbps",
                    header.version,
                    header.layer,
                    header.sample_rate,
                    header.channel_mode,
                    header.bitrate / 1000,
                );

                self.first_header = Some(frame.header);
            }

            match self.decoder.decode(&frame, sink) {
                Ok(status) => {
                    self.n_decoded += 1;

                    if status.skipped {
                        self.n_skipped += 1;
                    }

                    return Ok(Some(FrameInfo {
                        header: frame.header,
                        channels: self.decoder.output_channel_count(&frame.header),
                        skipped: status.skipped,
                        crc_mismatch: status.crc_mismatch,
                    }));
                }
                Err(Error::DecodeError(desc)) => {
                    warn!("mpa: skipping corrupt frame {}: {}", self.reader.frames_read(), desc);
                    self.n_rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Gets the header of the first frame, if a frame has been read.
    pub fn first_header(&self) -> Option<&FrameHeader> {
        self.first_header.as_ref()
    }

    /// Gets the current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.reader.sync_mode()
    }

    /// Gets the number of frames decoded, including skipped frames.
    pub fn frames_decoded(&self) -> u64 {
        self.n_decoded
    }

    /// Gets the number of frames that produced no samples because their main data was not
    /// available.
    pub fn frames_skipped(&self) -> u64 {
        self.n_skipped
    }

    /// Gets the number of corrupt frames that were rejected.
    pub fn frames_rejected(&self) -> u64 {
        self.n_rejected
    }

    /// Gets the options the decoder was instantiated with.
    pub fn options(&self) -> &DecoderOptions {
        self.decoder.options()
    }

    /// Clears all decoder state without repositioning the stream.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    /// Unwraps the decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read + Seek> Decoder<R> {
    /// Seeks the underlying reader and resets the decoder. The first frames decoded after a seek
    /// may be skipped while the bit reservoir refills.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let pos = self.reader.seek(pos)?;
        self.decoder.reset();
        Ok(pos)
    }
}
