// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::io::{Read, Seek};

use cadence_core::errors::Result;
use cadence_core::io::{PushbackStream, PushbackStreamOptions, ReadBytes};
use cadence_core::util::bits::synchsafe_to_u32;

use log::{debug, trace, warn};

use crate::common::FrameHeader;
use crate::header::{parse_frame_header, SyncMode, MAX_MPEG_FRAME_SIZE, MPEG_HEADER_LEN};

/// The ID3v2 tag marker.
const ID3V2_MARKER: u32 = 0x0049_4433;

/// Length of the ID3v2 tag header and footer.
const ID3V2_HEADER_LEN: u64 = 10;

/// A synchronized MPEG audio frame.
pub struct Frame<'a> {
    /// The parsed frame header.
    pub header: FrameHeader,
    /// The raw 32-bit frame header word.
    pub header_word: u32,
    /// The frame body following the header, including the CRC if present.
    pub data: &'a [u8],
}

/// Maps an end-of-stream error to `None`.
fn or_end_of_stream<T>(result: io::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// `FrameReader` synchronizes to, and reads, MPEG audio frames from a byte stream.
pub struct FrameReader<R: Read> {
    stream: PushbackStream<R>,
    sync_mode: SyncMode,
    buf: Box<[u8]>,
    n_frames: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader {
            stream: PushbackStream::new(inner, PushbackStreamOptions::default()),
            sync_mode: SyncMode::Initial,
            buf: vec![0; MAX_MPEG_FRAME_SIZE].into_boxed_slice(),
            n_frames: 0,
        }
    }

    /// Gets the current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Gets the number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.n_frames
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.stream.get_ref()
    }

    /// Unwraps the reader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.stream.into_inner()
    }

    /// Reads the next frame. Returns `Ok(None)` at the end of the stream.
    ///
    /// A candidate frame is only accepted if it is followed by another plausible frame header, or
    /// by the end of the stream. Otherwise the candidate is pushed back and the search resumes one
    /// byte after the start of the false header.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        loop {
            let header_word = match self.sync()? {
                Some(header_word) => header_word,
                None => return Ok(None),
            };

            let header = match parse_frame_header(header_word) {
                Ok(header) => header,
                Err(err) => {
                    debug!("mpa: rejected frame header {:#010x}: {}", header_word, err);
                    self.stream.unread(MPEG_HEADER_LEN - 1);
                    continue;
                }
            };

            // A truncated final frame ends the stream.
            let body = &mut self.buf[..header.frame_size];

            if or_end_of_stream(ReadBytes::read_buf_exact(&mut self.stream, body))?.is_none() {
                debug!("mpa: stream ended within a frame");
                return Ok(None);
            }

            if !self.is_next_frame_synced(header_word)? {
                trace!("mpa: frame header {:#010x} not followed by a frame", header_word);
                self.stream.unread(header.frame_size + MPEG_HEADER_LEN - 1);
                continue;
            }

            if self.sync_mode == SyncMode::Initial {
                debug!("mpa: synchronized to {:?} {:?}", header.version, header.layer);
                self.sync_mode = SyncMode::strict_from(header_word);
            }

            self.n_frames += 1;

            return Ok(Some(Frame { header, header_word, data: &self.buf[..header.frame_size] }));
        }
    }

    /// Scans the stream for a frame header word accepted by the current sync mode, skipping any
    /// ID3v2 tags along the way.
    fn sync(&mut self) -> Result<Option<u32>> {
        let mut sync = 0u32;
        let mut window_len = 0;
        let mut skipped = 0u64;

        loop {
            let byte = match or_end_of_stream(self.stream.read_byte())? {
                Some(byte) => byte,
                None => return Ok(None),
            };

            sync = (sync << 8) | u32::from(byte);
            window_len += 1;

            if window_len >= 3 && sync & 0x00ff_ffff == ID3V2_MARKER {
                match self.skip_id3v2_tag()? {
                    Some(true) => {
                        sync = 0;
                        window_len = 0;
                        continue;
                    }
                    Some(false) => (),
                    None => return Ok(None),
                }
            }

            if window_len >= 4 && self.sync_mode.accepts(sync) {
                if skipped > 0 {
                    if self.n_frames > 0 {
                        warn!("mpa: skipped {} bytes to resynchronize", skipped);
                    }
                    else {
                        debug!("mpa: skipped {} bytes before the first frame", skipped);
                    }
                }

                return Ok(Some(sync));
            }

            if window_len >= 4 {
                skipped += 1;
            }
        }
    }

    /// Skips an ID3v2 tag whose "ID3" marker was just read. Returns `Some(false)` and leaves the
    /// stream untouched if the remainder of the tag header is implausible.
    fn skip_id3v2_tag(&mut self) -> Result<Option<bool>> {
        // Major version, minor version, flags, 4 byte synchsafe size.
        let mut header = [0u8; 7];

        let read = self.stream.read(&mut header)?;

        if read < header.len() {
            self.stream.unread(read);
            return Ok(Some(false));
        }

        let is_valid =
            header[0] != 0xff && header[1] != 0xff && header[3..].iter().all(|&b| b < 0x80);

        if !is_valid {
            self.stream.unread(header.len());
            return Ok(Some(false));
        }

        let mut size = u64::from(synchsafe_to_u32(&header[3..]));

        // A footer follows the tag.
        if header[2] & 0x10 != 0 {
            size += ID3V2_HEADER_LEN;
        }

        debug!("mpa: skipping ID3v2.{} tag of {} bytes", header[0], size);

        Ok(or_end_of_stream(self.stream.ignore_bytes(size))?.map(|_| true))
    }

    /// Peeks at the 4 bytes following a candidate frame and returns true if they could start the
    /// next frame, a tag, or if the stream ends.
    fn is_next_frame_synced(&mut self, header_word: u32) -> Result<bool> {
        let mut next = [0u8; 4];

        let read = self.stream.read(&mut next)?;
        self.stream.unread(read);

        if read < next.len() {
            return Ok(true);
        }

        if &next[..3] == b"TAG" || &next[..3] == b"ID3" {
            return Ok(true);
        }

        Ok(SyncMode::strict_from(header_word).accepts(u32::from_be_bytes(next)))
    }
}

impl<R: Read + Seek> FrameReader<R> {
    /// Seeks the underlying reader. The sync mode established by the first frame is retained.
    pub fn seek(&mut self, pos: io::SeekFrom) -> Result<u64> {
        Ok(self.stream.seek(pos)?)
    }
}
