// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;
use std::io::{Read, Seek};

use super::ReadBytes;

const END_OF_STREAM_ERROR_STR: &str = "end of stream";

/// `PushbackStreamOptions` specifies the buffering behaviour of a `PushbackStream`.
pub struct PushbackStreamOptions {
    /// The ring buffer length. Must be a power of 2 and greater than 32kB.
    pub buffer_len: usize,
}

impl Default for PushbackStreamOptions {
    fn default() -> Self {
        PushbackStreamOptions { buffer_len: 64 * 1024 }
    }
}

/// A `PushbackStream` wraps any [`std::io::Read`]er in a read-ahead ring buffer which retains
/// already-read bytes so that they may be pushed back (unread) into the stream.
///
/// Frame synchronization reads a candidate frame speculatively and must be able to return those
/// bytes to the stream when the candidate turns out to be false. The stream can unread up-to the
/// minimum of `buffer_len - 1` or the total number of bytes read since instantiation or the last
/// reset, less any bytes already pushed back.
pub struct PushbackStream<R: Read> {
    /// The source reader.
    inner: R,
    /// The ring buffer.
    ring: Box<[u8]>,
    /// The ring buffer's wrap-around mask.
    ring_mask: usize,
    /// The read position.
    read_pos: usize,
    /// The write position.
    write_pos: usize,
    /// The current block size for a new read.
    read_block_len: usize,
    /// Absolute position of the inner stream.
    abs_pos: u64,
    /// Count of bytes read from the inner reader since instantiation or the last reset.
    rel_pos: u64,
}

impl<R: Read> PushbackStream<R> {
    const MIN_BLOCK_LEN: usize = 1 * 1024;
    const MAX_BLOCK_LEN: usize = 32 * 1024;

    pub fn new(inner: R, options: PushbackStreamOptions) -> Self {
        // The buffer length must be a power of 2, and > the maximum read block length.
        assert!(options.buffer_len.count_ones() == 1);
        assert!(options.buffer_len > Self::MAX_BLOCK_LEN);

        PushbackStream {
            inner,
            ring: vec![0; options.buffer_len].into_boxed_slice(),
            ring_mask: options.buffer_len - 1,
            read_pos: 0,
            write_pos: 0,
            read_block_len: Self::MIN_BLOCK_LEN,
            abs_pos: 0,
            rel_pos: 0,
        }
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps this `PushbackStream<R>`, returning the underlying reader. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Get the number of bytes buffered but not yet read.
    pub fn unread_buffer_len(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        }
        else {
            self.write_pos + (self.ring.len() - self.read_pos)
        }
    }

    /// Gets the number of bytes buffered and read. This is the maximum number of bytes that can
    /// be unread.
    pub fn read_buffer_len(&self) -> usize {
        let unread_len = self.unread_buffer_len();

        // A completely full ring is indistinguishable from an empty one, so one slot is reserved.
        cmp::min(self.ring.len() - 1, self.rel_pos as usize) - unread_len
    }

    /// Pushes the last `len` bytes read back into the stream so that they will be read again.
    /// Returns the number of bytes actually unread, which is less than `len` only if fewer bytes
    /// are available in the buffer.
    pub fn unread(&mut self, len: usize) -> usize {
        let len = cmp::min(len, self.read_buffer_len());
        self.read_pos = (self.read_pos + self.ring.len() - len) & self.ring_mask;
        len
    }

    /// Returns if the buffer has been exhausted.
    #[inline(always)]
    fn is_buffer_exhausted(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish the buffer.
    fn fetch(&mut self) -> io::Result<()> {
        if self.is_buffer_exhausted() {
            // Never read past the physical end of the ring. The next fetch continues at the start.
            let end = cmp::min(self.write_pos + self.read_block_len, self.ring.len());

            let actual_read_len = loop {
                match self.inner.read(&mut self.ring[self.write_pos..end]) {
                    Ok(len) => break len,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            };

            self.write_pos = (self.write_pos + actual_read_len) & self.ring_mask;

            self.abs_pos += actual_read_len as u64;
            self.rel_pos += actual_read_len as u64;

            // Grow the read block length exponentially.
            self.read_block_len = cmp::min(self.read_block_len << 1, Self::MAX_BLOCK_LEN);
        }

        Ok(())
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish the buffer. If
    /// no more data could be fetched, return an end-of-stream error.
    fn fetch_or_eof(&mut self) -> io::Result<()> {
        self.fetch()?;

        if self.is_buffer_exhausted() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, END_OF_STREAM_ERROR_STR));
        }

        Ok(())
    }

    #[inline(always)]
    fn consume(&mut self, len: usize) {
        self.read_pos = (self.read_pos + len) & self.ring_mask;
    }

    /// Gets the largest contiguous slice of buffered data starting from the read position.
    #[inline(always)]
    fn contiguous_buf(&self) -> &[u8] {
        if self.write_pos >= self.read_pos {
            &self.ring[self.read_pos..self.write_pos]
        }
        else {
            &self.ring[self.read_pos..]
        }
    }

    /// Discards all buffered data and sets the absolute stream position to `pos`.
    fn reset(&mut self, pos: u64) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.read_block_len = Self::MIN_BLOCK_LEN;
        self.abs_pos = pos;
        self.rel_pos = 0;
    }
}

impl<R: Read + Seek> PushbackStream<R> {
    /// Seeks the underlying reader. All buffered and pushed back data is discarded.
    pub fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        // The inner reader is ahead of the stream by the number of unread buffered bytes.
        let pos = match pos {
            io::SeekFrom::Current(delta) => {
                let delta = delta - self.unread_buffer_len() as i64;
                self.inner.seek(io::SeekFrom::Current(delta))
            }
            _ => self.inner.seek(pos),
        }?;

        self.reset(pos);

        Ok(pos)
    }
}

impl<R: Read> Read for PushbackStream<R> {
    fn read(&mut self, mut buf: &mut [u8]) -> io::Result<usize> {
        let read_len = buf.len();

        while !buf.is_empty() {
            self.fetch()?;

            let count = cmp::min(buf.len(), self.contiguous_buf().len());

            if count == 0 {
                break;
            }

            buf[..count].copy_from_slice(&self.contiguous_buf()[..count]);
            buf = &mut buf[count..];
            self.consume(count);
        }

        Ok(read_len - buf.len())
    }
}

impl<R: Read> ReadBytes for PushbackStream<R> {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        if self.is_buffer_exhausted() {
            self.fetch_or_eof()?;
        }

        let value = self.ring[self.read_pos];
        self.consume(1);

        Ok(value)
    }

    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        let mut bytes = [0; 2];
        ReadBytes::read_buf_exact(self, &mut bytes)?;
        Ok(bytes)
    }

    fn read_buf_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read(buf) {
                Ok(0) => break,
                Ok(count) => buf = &mut buf[count..],
                Err(e) => return Err(e),
            }
        }

        if !buf.is_empty() {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, END_OF_STREAM_ERROR_STR))
        }
        else {
            Ok(())
        }
    }

    fn ignore_bytes(&mut self, mut count: u64) -> io::Result<()> {
        while count > 0 {
            self.fetch_or_eof()?;
            let discard = cmp::min(self.unread_buffer_len() as u64, count);
            self.consume(discard as usize);
            count -= discard;
        }

        Ok(())
    }

    fn pos(&self) -> u64 {
        self.abs_pos - self.unread_buffer_len() as u64
    }
}
