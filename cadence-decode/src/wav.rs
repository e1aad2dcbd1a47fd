// Cadence Decode Tool
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::io::{Seek, SeekFrom, Write};

/// The length of the canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: u32 = 44;

/// Writes 16-bit PCM into a canonical RIFF/WAVE file.
///
/// The header is written with empty chunk sizes, which are patched by `finalize`.
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    n_channels: u16,
    sample_rate: u32,
    data_len: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, sample_rate: u32, n_channels: u16) -> io::Result<Self> {
        inner.write_all(&wav_header(sample_rate, n_channels, 0))?;
        Ok(WavWriter { inner, n_channels, sample_rate, data_len: 0 })
    }

    /// Writes interleaved little-endian PCM bytes.
    pub fn write_pcm(&mut self, pcm: &[u8]) -> io::Result<()> {
        let len = u32::try_from(pcm.len())
            .ok()
            .and_then(|len| self.data_len.checked_add(len))
            .filter(|&len| len <= u32::MAX - WAV_HEADER_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "wav: data chunk too large"))?;

        self.inner.write_all(pcm)?;
        self.data_len = len;
        Ok(())
    }

    /// Patches the chunk sizes in the header and returns the underlying writer.
    pub fn finalize(mut self) -> io::Result<W> {
        let header = wav_header(self.sample_rate, self.n_channels, self.data_len);

        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&header)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

/// Builds the header of a 16-bit PCM WAVE file with `data_len` bytes of sample data.
pub fn wav_header(sample_rate: u32, n_channels: u16, data_len: u32) -> [u8; 44] {
    let block_align = 2 * n_channels;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut header = [0u8; 44];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(data_len + WAV_HEADER_LEN - 8).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // The format chunk.
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    // PCM
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&n_channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&16u16.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    header
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn verify_wav_header() {
        let header = wav_header(44_100, 2, 4608);

        assert_eq!(&header[..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 4608 + 36);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes([header[28], header[29], header[30], header[31]]), 176_400);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes([header[40], header[41], header[42], header[43]]), 4608);
    }

    #[test]
    fn verify_wav_writer_patches_sizes() {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), 22_050, 1).unwrap();

        writer.write_pcm(&[1, 0, 2, 0]).unwrap();
        writer.write_pcm(&[3, 0]).unwrap();

        let buf = writer.finalize().unwrap().into_inner();

        assert_eq!(buf.len(), 44 + 6);
        assert_eq!(&buf[..44], &wav_header(22_050, 1, 6));
        assert_eq!(&buf[44..], &[1, 0, 2, 0, 3, 0]);
    }
}
