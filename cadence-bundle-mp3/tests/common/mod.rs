// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthesizes MPEG audio Layer III streams for the integration tests.

#![allow(dead_code)]

use cadence_bundle_mp3::parse_frame_header;
use cadence_core::checksum::{Crc16Ansi, Monitor};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// MPEG1 Layer III, 128 kbps, 44.1 kHz, no CRC, no padding, stereo.
pub const MPEG1_STEREO: u32 = 0xfffb_9004;
/// MPEG1 Layer III, 128 kbps, 44.1 kHz, no CRC, no padding, mono.
pub const MPEG1_MONO: u32 = 0xfffb_90c4;
/// MPEG1 Layer III, 128 kbps, 44.1 kHz, no CRC, no padding, joint stereo (mid-side).
pub const MPEG1_JOINT_STEREO: u32 = 0xfffb_9064;
/// MPEG1 Layer III, 128 kbps, 44.1 kHz, CRC protected, no padding, stereo.
pub const MPEG1_STEREO_CRC: u32 = 0xfffa_9004;
/// MPEG2 Layer III, 64 kbps, 22.05 kHz, no CRC, no padding, stereo.
pub const MPEG2_STEREO: u32 = 0xfff3_8004;

/// Writes bits most-significant first into a byte buffer.
#[derive(Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    n_bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Writes the `len` least significant bits of `value`.
    pub fn write_bits(&mut self, value: u32, len: u32) {
        for i in (0..len).rev() {
            self.write_bit((value >> i) & 1 != 0);
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        if self.n_bits % 8 == 0 {
            self.buf.push(0);
        }

        if bit {
            let last = self.buf.len() - 1;
            self.buf[last] |= 0x80 >> (self.n_bits % 8);
        }

        self.n_bits += 1;
    }

    /// Gets the number of bits written.
    pub fn len(&self) -> usize {
        self.n_bits
    }

    /// Returns the written bytes. The final byte is zero padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// The spectral content of one channel of one granule: a list of big_values pairs, each sample
/// in {-1, 0, 1}.
#[derive(Clone, Debug)]
pub struct GranuleContent {
    pub pairs: Vec<(i8, i8)>,
    pub global_gain: u8,
}

impl GranuleContent {
    /// Generates random spectral content.
    pub fn random(rng: &mut SmallRng, n_pairs: usize) -> Self {
        let pairs = (0..n_pairs)
            .map(|_| (rng.random_range(-1..=1), rng.random_range(-1..=1)))
            .collect();

        GranuleContent { pairs, global_gain: 170 }
    }

    /// Generates content with no non-zero samples.
    pub fn silence() -> Self {
        GranuleContent { pairs: Vec::new(), global_gain: 170 }
    }

    /// Writes the part3 Huffman coded samples with table 1, returning the number of bits written.
    fn write_part3(&self, bw: &mut BitWriter) -> u32 {
        let start = bw.len();

        for &(x, y) in &self.pairs {
            // Table 1 codewords for (|x|, |y|).
            let (code, len) = match (x != 0, y != 0) {
                (false, false) => (0b1, 1),
                (false, true) => (0b001, 3),
                (true, false) => (0b01, 2),
                (true, true) => (0b000, 3),
            };

            bw.write_bits(code, len);

            for v in [x, y] {
                if v != 0 {
                    bw.write_bit(v < 0);
                }
            }
        }

        (bw.len() - start) as u32
    }
}

/// Computes the CRC of a frame from the low 16 bits of its header and the protected bytes that
/// follow the stored CRC.
pub fn frame_crc(header_word: u32, protected: &[u8]) -> u16 {
    let mut crc = Crc16Ansi::new(0xffff);
    crc.process_bits(header_word & 0xffff, 16);
    crc.process_buf_bytes(protected);
    crc.crc()
}

/// Gets the length of a frame, including the header.
pub fn frame_len(header_word: u32) -> usize {
    parse_frame_header(header_word).unwrap().frame_size + 4
}

/// Writes the side info of one granule channel.
fn write_granule_channel_side_info(
    bw: &mut BitWriter,
    is_mpeg1: bool,
    part2_3_length: u32,
    content: &GranuleContent,
) {
    bw.write_bits(part2_3_length, 12);
    bw.write_bits(content.pairs.len() as u32, 9);
    bw.write_bits(u32::from(content.global_gain), 8);
    // scalefac_compress: no scale factor bits.
    bw.write_bits(0, if is_mpeg1 { 4 } else { 9 });
    // No window switching.
    bw.write_bit(false);
    // table_select, all table 1.
    for _ in 0..3 {
        bw.write_bits(1, 5);
    }
    // region0_count and region1_count.
    bw.write_bits(15, 4);
    bw.write_bits(7, 3);
    if is_mpeg1 {
        // preflag
        bw.write_bit(false);
    }
    // scalefac_scale, count1table_select
    bw.write_bit(false);
    bw.write_bit(false);
}

/// The main data of a frame, before it is split between frames.
pub struct MainData {
    pub bytes: Vec<u8>,
    pub part2_3_lengths: Vec<u32>,
}

/// Huffman codes the granules of a frame. `granules[gr][ch]` is the content of channel `ch` in
/// granule `gr`.
pub fn encode_main_data(granules: &[Vec<GranuleContent>]) -> MainData {
    let mut bw = BitWriter::new();
    let mut part2_3_lengths = Vec::new();

    for granule in granules {
        for content in granule {
            part2_3_lengths.push(content.write_part3(&mut bw));
        }
    }

    MainData { bytes: bw.into_bytes(), part2_3_lengths }
}

/// Builds a complete Layer III frame. `slots` is the main data carried by the frame, zero padded to
/// the frame's capacity, and `main_data_begin` is the number of bytes of main data in preceding
/// frames.
pub fn build_frame(
    header_word: u32,
    main_data_begin: u32,
    granules: &[Vec<GranuleContent>],
    part2_3_lengths: &[u32],
    slots: &[u8],
) -> Vec<u8> {
    let header = parse_frame_header(header_word).unwrap();
    let is_mpeg1 = header.is_mpeg1();
    let n_channels = header.n_channels();

    let mut bw = BitWriter::new();

    bw.write_bits(header_word, 32);

    // Placeholder for the CRC, computed once the side info is written.
    let crc_len = if header.has_crc { 2 } else { 0 };
    bw.write_bits(0, 8 * crc_len as u32);

    if is_mpeg1 {
        bw.write_bits(main_data_begin, 9);
        bw.write_bits(0, if n_channels == 1 { 5 } else { 3 });
        // No scale factor sharing.
        bw.write_bits(0, 4 * n_channels as u32);
    }
    else {
        bw.write_bits(main_data_begin, 8);
        bw.write_bits(0, if n_channels == 1 { 1 } else { 2 });
    }

    let mut lengths = part2_3_lengths.iter();

    for granule in granules {
        assert_eq!(granule.len(), n_channels);

        for content in granule {
            write_granule_channel_side_info(&mut bw, is_mpeg1, *lengths.next().unwrap(), content);
        }
    }

    let side_info_end = 4 + crc_len + header.side_info_len();
    assert_eq!(bw.len(), 8 * side_info_end);

    let mut frame = bw.into_bytes();

    if header.has_crc {
        let crc = frame_crc(header_word, &frame[6..side_info_end]);
        frame[4..6].copy_from_slice(&crc.to_be_bytes());
    }

    let main_data_len = header.main_data_len();
    assert!(slots.len() <= main_data_len);

    frame.extend_from_slice(slots);
    frame.resize(header.frame_size + 4, 0);

    frame
}

/// Builds a frame whose main data is entirely contained in the frame.
pub fn self_contained_frame(header_word: u32, granules: &[Vec<GranuleContent>]) -> Vec<u8> {
    let main_data = encode_main_data(granules);
    build_frame(header_word, 0, granules, &main_data.part2_3_lengths, &main_data.bytes)
}

/// Generates random content for every granule and channel of a frame.
pub fn random_granules(
    rng: &mut SmallRng,
    header_word: u32,
    n_pairs: usize,
) -> Vec<Vec<GranuleContent>> {
    let header = parse_frame_header(header_word).unwrap();

    (0..header.n_granules())
        .map(|_| (0..header.n_channels()).map(|_| GranuleContent::random(rng, n_pairs)).collect())
        .collect()
}

/// Builds a stream of `n_frames` self-contained frames of random content.
pub fn random_stream(seed: u64, header_word: u32, n_frames: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut stream = Vec::new();

    for _ in 0..n_frames {
        let granules = random_granules(&mut rng, header_word, 96);
        stream.extend(self_contained_frame(header_word, &granules));
    }

    stream
}

/// Generates `len` bytes of random garbage that contains no byte of 0xff, and thus no sync word.
pub fn garbage(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(0..0xff)).collect()
}
