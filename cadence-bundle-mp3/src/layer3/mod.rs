// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::io;

use cadence_core::checksum::Monitor;
use cadence_core::errors::{decode_error, Error, Result};
use cadence_core::io::{BitReaderLtr, BufReader, ReadBytes};

use log::{debug, warn};

use crate::common::*;
use crate::reader::Frame;
use crate::synthesis;

mod bitstream;
mod huffman;
mod hybrid_synthesis;
mod requantize;
mod reservoir;
mod stereo;

use reservoir::{BitReservoir, RESERVOIR_LEN};

/// `FrameData` contains the side_info portion of a MPEG audio frame.
#[derive(Default, Debug)]
struct FrameData {
    /// The byte offset into the bit resevoir indicating the location of the first bit of main_data.
    /// If 0, main_data begins after the side_info of this frame.
    main_data_begin: u16,
    /// Scale factor selector information, per channel. Each channel has 4 groups of bands that may
    /// be scaled in each granule. Scale factors may optionally be used by both granules to save
    /// bits. Bands that share scale factors for both granules are indicated by a true. Otherwise,
    /// each granule must store its own set of scale factors.
    ///
    /// Mapping of array indicies to bands [0..6, 6..11, 11..16, 16..21].
    scfsi: [[bool; 4]; 2],
    /// The granules.
    granules: [Granule; 2],
}

#[derive(Default, Debug)]
struct Granule {
    /// Channels in the granule.
    channels: [GranuleChannel; 2],
}

struct GranuleChannel {
    /// Total number of bits used for scale factors (part2) and Huffman encoded data (part3).
    part2_3_length: u16,
    /// HALF the number of samples in the big_values partition (sum of all samples in
    /// `region[0..3]`).
    big_values: u16,
    /// Logarithmic quantization step size.
    global_gain: u8,
    /// Depending on the MPEG version, `scalefac_compress` determines how many bits are allocated
    /// per scale factor.
    ///
    /// - For MPEG1 bitstreams, `scalefac_compress` is a 4-bit index into
    ///  `SCALE_FACTOR_SLEN[0..16]` to obtain a number of bits per scale factor pair.
    ///
    /// - For MPEG2/2.5 bitstreams, `scalefac_compress` is a 9-bit value that decodes into
    /// `slen[0..3]` (referred to as slen1-4 in the standard) for the number of bits per scale
    /// factor, and depending on which range the value falls into, for which bands.
    scalefac_compress: u16,
    /// Indicates the block type (type of window) for the channel in the granule.
    block_type: BlockType,
    /// Gain factors for the three windows of short blocks. Each gain factor has a maximum value of
    /// 7 (3 bits).
    subblock_gain: [u8; 3],
    /// The Huffman table to use for decoding `region[0..3]` of big_values.
    table_select: [u8; 3],
    /// The index of the first sample in region1 of big_values.
    region1_start: usize,
    /// The index of the first sample in region2 of big_values.
    region2_start: usize,
    /// Indicates if the pre-emphasis amount for each scale factor band should be added on to each
    /// scale factor before requantization.
    preflag: bool,
    /// A 0.5x (false) or 1x (true) multiplier for scale factors.
    scalefac_scale: bool,
    /// Use Huffman Quads table A (false) or B (true), for decoding the count1 partition.
    count1table_select: bool,
    /// The starting sample index of the rzero partition, or the count of big_values and count1
    /// samples.
    rzero: usize,
}

impl Default for GranuleChannel {
    fn default() -> Self {
        GranuleChannel {
            part2_3_length: 0,
            big_values: 0,
            global_gain: 0,
            scalefac_compress: 0,
            block_type: BlockType::Long,
            subblock_gain: [0; 3],
            table_select: [0; 3],
            region1_start: 0,
            region2_start: 0,
            preflag: false,
            scalefac_scale: false,
            count1table_select: false,
            rzero: 0,
        }
    }
}

impl fmt::Debug for GranuleChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GranuleChannel {{")?;
        writeln!(f, "\tpart2_3_length={}", self.part2_3_length)?;
        writeln!(f, "\tbig_values={}", self.big_values)?;
        writeln!(f, "\tglobal_gain={}", self.global_gain)?;
        writeln!(f, "\tscalefac_compress={}", self.scalefac_compress)?;
        writeln!(f, "\tblock_type={:?}", self.block_type)?;
        writeln!(f, "\tsubblock_gain={:?}", self.subblock_gain)?;
        writeln!(f, "\ttable_select={:?}", self.table_select)?;
        writeln!(f, "\tregion1_start={}", self.region1_start)?;
        writeln!(f, "\tregion2_start={}", self.region2_start)?;
        writeln!(f, "\tpreflag={}", self.preflag)?;
        writeln!(f, "\tscalefac_scale={}", self.scalefac_scale)?;
        writeln!(f, "\tcount1table_select={}", self.count1table_select)?;
        writeln!(f, "\trzero={}", self.rzero)?;
        writeln!(f, "}}")
    }
}

/// The scale factors of one channel.
///
/// Long blocks use `long[0..22]`. Short blocks use `short[win][0..13]` for each of the three
/// windows. Mixed blocks use the leading long bands followed by the short bands starting at
/// `MIXED_FIRST_SHORT_BAND`. The last band of each layout is never transmitted and is always 0.
///
/// For LSF bitstreams, the largest value each scale factor can be coded with is also kept. This
/// is the invalid intensity position of the band.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScaleFactors {
    pub long: [u8; 23],
    pub short: [[u8; 13]; 3],
    pub long_is_max: [u8; 23],
    pub short_is_max: [[u8; 13]; 3],
}

/// Converts a bit reservoir underrun into a decode error. An underrun is caused by side info that
/// is inconsistent with the main data, and is recoverable.
fn map_underrun<T>(result: Result<T>, desc: &'static str) -> Result<T> {
    match result {
        Err(Error::IoError(err)) if err.kind() == io::ErrorKind::Other => decode_error(desc),
        result => result,
    }
}

/// The Layer III decoder.
pub struct Layer3 {
    reservoir: BitReservoir,
    /// Scale factors of each channel. These persist between the granules of a frame.
    scalefacs: [ScaleFactors; 2],
    /// Spectral, then time-domain, samples of each channel for the current granule.
    samples: [[f32; SAMPLES_PER_GRANULE]; 2],
    /// The second half of the previous IMDCT output of each sub-band, for each channel.
    overlap: [[[f32; 18]; 32]; 2],
    synthesis: [synthesis::SynthesisState; 2],
}

impl Layer3 {
    pub fn new() -> Self {
        Layer3 {
            reservoir: Default::default(),
            scalefacs: Default::default(),
            samples: [[0f32; SAMPLES_PER_GRANULE]; 2],
            overlap: [[[0f32; 18]; 32]; 2],
            synthesis: Default::default(),
        }
    }

    /// Reads the scale factors and Huffman coded samples of a channel in a granule from the bit
    /// reservoir.
    fn read_main_data(
        &mut self,
        header: &FrameHeader,
        frame_data: &mut FrameData,
        gr: usize,
        ch: usize,
    ) -> Result<()> {
        let part2_start = self.reservoir.tell();

        // Read the scale factors (part2) and get the number of bits read.
        let part2_len = if header.is_mpeg1() {
            bitstream::read_scale_factors_mpeg1(
                &mut self.reservoir,
                gr,
                ch,
                frame_data,
                &mut self.scalefacs[ch],
            )
        }
        else {
            bitstream::read_scale_factors_lsf(
                &mut self.reservoir,
                ch > 0 && header.is_intensity_stereo(),
                &mut frame_data.granules[gr].channels[ch],
                &mut self.scalefacs[ch],
            )
        };

        let part2_len = map_underrun(part2_len, "mpa: scale factors overrun main data")?;

        let channel = &mut frame_data.granules[gr].channels[ch];

        let part2_3_length = u32::from(channel.part2_3_length);

        // The part2 length must be less than or equal to the part2_3_length.
        if part2_len > part2_3_length {
            return decode_error("mpa: part2_3_length is not valid");
        }

        let part3_end = part2_start + u64::from(part2_3_length);

        // Decode the Huffman coded spectral samples and get the starting index of the rzero
        // partition.
        let rzero = requantize::read_huffman_samples(
            &mut self.reservoir,
            channel,
            part3_end,
            &mut self.samples[ch],
        );

        channel.rzero = map_underrun(rzero.map_err(Error::from), "mpa: huffman decode overrun")?;

        // The Huffman decoder may stop short of, or run past, the end of part3. The next channel
        // always starts exactly at the end of this one.
        map_underrun(
            self.reservoir.seek_bits(part3_end).map_err(Error::from),
            "mpa: part2_3_length exceeds main data",
        )
    }

    /// Decodes the granules of a frame whose main data is available in the bit reservoir.
    fn decode_granules(
        &mut self,
        header: &FrameHeader,
        frame_data: &mut FrameData,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<()> {
        let n_channels = header.n_channels();

        for gr in 0..header.n_granules() {
            for ch in 0..n_channels {
                self.read_main_data(header, frame_data, gr, ch)?;
            }

            let granule = &frame_data.granules[gr];

            // Requantize all non-zero (big_values and count1 partition) spectral samples.
            for ch in 0..n_channels {
                requantize::requantize(
                    header,
                    &granule.channels[ch],
                    &self.scalefacs[ch],
                    &mut self.samples[ch],
                );
            }

            if n_channels == 2 {
                // Apply joint stereo processing if it is used.
                let mut rzero = [granule.channels[0].rzero, granule.channels[1].rzero];

                stereo::stereo(header, granule, &self.scalefacs, &mut rzero, &mut self.samples)?;

                if ctx.output_channels == OutputChannels::Downmix {
                    let [left, right] = &mut self.samples;

                    for (l, r) in left.iter_mut().zip(right.iter()) {
                        *l = 0.5 * (*l + *r);
                    }
                }
            }

            // The next steps are independant of channel count, and only the channels selected for
            // output are synthesized.
            for &ch in ctx.output_channels.source_channels(n_channels) {
                let channel = &granule.channels[ch];
                let samples = &mut self.samples[ch];

                // Reorder the spectral samples in short blocks into sub-band order.
                hybrid_synthesis::reorder(header, channel, samples);

                // Apply the anti-aliasing filter to all block types other than short.
                hybrid_synthesis::antialias(channel, samples);

                // Perform hybrid-synthesis (IMDCT and windowing).
                hybrid_synthesis::hybrid_synthesis(channel, &mut self.overlap[ch], samples);

                // Invert every second sample in every second sub-band to negate the frequency
                // inversion of the polyphase filterbank.
                hybrid_synthesis::frequency_inversion(samples);
            }

            // Perform polyphase synthesis and generate PCM samples.
            synthesis::synthesis_channels(
                &mut self.synthesis,
                18,
                [&self.samples[0], &self.samples[1]],
                n_channels,
                ctx,
            );
        }

        Ok(())
    }
}

impl Default for Layer3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Layer3 {
    fn decode(&mut self, frame: &Frame<'_>, ctx: &mut DecodeContext<'_>) -> Result<FrameStatus> {
        let header = &frame.header;

        let crc_len = if header.has_crc { 2 } else { 0 };

        if frame.data.len() < crc_len + header.side_info_len() {
            return decode_error("mpa: frame too short for side info");
        }

        let mut reader = BufReader::new(frame.data);

        let stored_crc = if header.has_crc { Some(reader.read_be_u16()?) } else { None };

        let side_info = reader.read_buf_bytes_ref(header.side_info_len())?;
        let main_data = reader.read_buf_bytes_available_ref();

        let mut status = FrameStatus::default();

        // The CRC covers the last 16 bits of the header and the side info.
        if let Some(stored_crc) = stored_crc {
            let mut crc = header_crc(frame.header_word);
            crc.process_buf_bytes(side_info);

            status.crc_mismatch = check_crc(stored_crc, &crc, ctx.verify_crc)?;
        }

        // Initialize an empty FrameData to store the side_info of the frame.
        let mut frame_data: FrameData = Default::default();

        if let Err(err) =
            bitstream::read_side_info(&mut BitReaderLtr::new(side_info), header, &mut frame_data)
        {
            // A failure in reading this frame will cause a discontinuity in the main data.
            // Therefore, clear the bit reservoir since it will not be valid for the next frame.
            self.reservoir.clear();
            return Err(err);
        }

        // Renormalize the reservoir positions once a full capacity has been consumed.
        if (self.reservoir.tell() + 7) >> 3 > RESERVOIR_LEN as u64 {
            self.reservoir.rebase(RESERVOIR_LEN as u64);
        }

        // The end of the main data of the previous frame, rounded up to the next byte.
        let main_data_end = (self.reservoir.tell() + 7) >> 3;

        // The start of this frame's main data slots in the reservoir.
        let frame_start = self.reservoir.bytes_written();

        self.reservoir.put_buf(main_data);

        let bytes_to_discard =
            frame_start as i64 - main_data_end as i64 - i64::from(frame_data.main_data_begin);

        if bytes_to_discard < 0 {
            // The main data of this frame begins in a frame that was never received. This is
            // expected for the first frames after a seek.
            warn!(
                "mpa: main data not yet available ({} bytes missing), skipping frame",
                -bytes_to_discard
            );
            return Ok(FrameStatus { skipped: true, ..status });
        }

        if bytes_to_discard > 0 {
            debug!("mpa: discarding {} bytes of stale main data", bytes_to_discard);
        }

        self.reservoir.seek_bits(8 * (main_data_end + bytes_to_discard as u64))?;

        if let Err(err) = self.decode_granules(header, &mut frame_data, ctx) {
            warn!("mpa: main data is corrupt, clearing the bit reservoir");
            self.reservoir.clear();
            return Err(err);
        }

        Ok(status)
    }

    fn reset(&mut self) {
        self.reservoir.clear();
        self.scalefacs = Default::default();
        self.overlap = [[[0f32; 18]; 32]; 2];

        for state in self.synthesis.iter_mut() {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use cadence_core::audio::{OutputSink, SUBBAND_BLOCK_LEN};

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use crate::common::{SFB_LONG_BANDS, SFB_SHORT_WINDOW_BANDS};
    use crate::decoder::{DecoderOptions, MpaDecoder};
    use crate::header::parse_frame_header;
    use crate::reader::Frame;
    use crate::synthesis::tests::ReferenceSynthesis;

    /// MPEG1 Layer III, 128 kbps, 44.1 kHz, mono.
    const HEADER_WORD: u32 = 0xfffb_90c4;

    /// Collects the PCM samples of a mono frame before they are quantized.
    #[derive(Default)]
    struct CaptureSink {
        samples: Vec<f32>,
    }

    impl OutputSink for CaptureSink {
        fn append_samples(&mut self, channel: usize, samples: &[f32; SUBBAND_BLOCK_LEN]) {
            assert_eq!(channel, 0);
            self.samples.extend_from_slice(samples);
        }

        fn clear(&mut self) {
            self.samples.clear();
        }

        fn flush_frame(&mut self) {}
    }

    #[derive(Default)]
    struct Bits(Vec<bool>);

    impl Bits {
        fn put(&mut self, value: u32, len: u32) {
            for i in (0..len).rev() {
                self.0.push((value >> i) & 1 != 0);
            }
        }

        fn to_bytes(&self) -> Vec<u8> {
            let mut buf = vec![0u8; (self.0.len() + 7) / 8];

            for (i, &bit) in self.0.iter().enumerate() {
                if bit {
                    buf[i >> 3] |= 0x80 >> (i & 7);
                }
            }

            buf
        }
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Block {
        Long,
        Start,
        Short,
        Mixed,
        End,
    }

    /// The coded content of one granule of a mono frame. All scale factors are coded with 1 bit
    /// (scalefac_compress 5), and all 576 samples are big_values coded with Huffman table 1.
    struct Granule {
        block: Block,
        global_gain: u8,
        subblock_gain: [u8; 3],
        long_sf: [u8; 22],
        /// Short window scale factors, `short_sf[sfb][win]`.
        short_sf: [[u8; 3]; 13],
        /// Quantized samples in coded order.
        values: Vec<i8>,
    }

    impl Granule {
        fn random(rng: &mut SmallRng, block: Block) -> Self {
            let mut long_sf = [0; 22];
            for sf in long_sf[..21].iter_mut() {
                *sf = rng.random_range(0..=1);
            }

            let mut short_sf = [[0; 3]; 13];
            for sf in short_sf[..12].iter_mut().flatten() {
                *sf = rng.random_range(0..=1);
            }

            Granule {
                block,
                global_gain: 180,
                subblock_gain: [rng.random_range(0..4), rng.random_range(0..4), 0],
                long_sf,
                short_sf,
                values: (0..576).map(|_| rng.random_range(-1..=1)).collect(),
            }
        }

        /// Writes the scale factors and Huffman coded samples, returning part2_3_length.
        fn write_main_data(&self, bits: &mut Bits) -> u32 {
            let start = bits.0.len();

            match self.block {
                Block::Short => {
                    for sf in self.short_sf[..12].iter().flatten() {
                        bits.put(u32::from(*sf), 1);
                    }
                }
                Block::Mixed => {
                    for sf in &self.long_sf[..8] {
                        bits.put(u32::from(*sf), 1);
                    }
                    for sf in self.short_sf[3..12].iter().flatten() {
                        bits.put(u32::from(*sf), 1);
                    }
                }
                _ => {
                    for sf in &self.long_sf[..21] {
                        bits.put(u32::from(*sf), 1);
                    }
                }
            }

            for pair in self.values.chunks_exact(2) {
                // Table 1 codewords for (|x|, |y|).
                let (code, len) = match (pair[0] != 0, pair[1] != 0) {
                    (false, false) => (0b1, 1),
                    (false, true) => (0b001, 3),
                    (true, false) => (0b01, 2),
                    (true, true) => (0b000, 3),
                };

                bits.put(code, len);

                for &v in pair.iter().filter(|&&v| v != 0) {
                    bits.put(u32::from(v < 0), 1);
                }
            }

            (bits.0.len() - start) as u32
        }

        fn write_side_info(&self, bits: &mut Bits, part2_3_length: u32) {
            bits.put(part2_3_length, 12);
            bits.put(288, 9);
            bits.put(u32::from(self.global_gain), 8);
            bits.put(5, 4);

            if self.block == Block::Long {
                bits.put(0, 1);
                bits.put(1, 5);
                bits.put(1, 5);
                bits.put(1, 5);
                bits.put(15, 4);
                bits.put(7, 3);
            }
            else {
                let (block_type, is_mixed) = match self.block {
                    Block::Start => (1, 0),
                    Block::Short => (2, 0),
                    Block::Mixed => (2, 1),
                    _ => (3, 0),
                };

                bits.put(1, 1);
                bits.put(block_type, 2);
                bits.put(is_mixed, 1);
                bits.put(1, 5);
                bits.put(1, 5);

                for gain in self.subblock_gain {
                    bits.put(u32::from(gain), 3);
                }
            }

            // preflag, scalefac_scale, and count1table_select.
            bits.put(0, 3);
        }
    }

    /// Builds the body of a self-contained frame carrying two granules.
    fn build_frame(granules: &[Granule; 2]) -> Vec<u8> {
        let mut main_data = Bits::default();
        let lengths = [
            granules[0].write_main_data(&mut main_data),
            granules[1].write_main_data(&mut main_data),
        ];

        let mut side_info = Bits::default();

        // main_data_begin, private bits, and scfsi.
        side_info.put(0, 9);
        side_info.put(0, 5);
        side_info.put(0, 4);

        for (gr, len) in granules.iter().zip(lengths) {
            gr.write_side_info(&mut side_info, len);
        }

        assert_eq!(side_info.0.len(), 8 * 17);

        let frame_size = parse_frame_header(HEADER_WORD).unwrap().frame_size;

        let mut data = side_info.to_bytes();
        data.extend(main_data.to_bytes());

        assert!(data.len() <= frame_size);
        data.resize(frame_size, 0);
        data
    }

    /// Decodes granules in double precision by evaluating requantization, alias reduction, the
    /// IMDCT, and windowing directly from their definitions in ISO/IEC 11172-3.
    struct ReferenceDecoder {
        overlap: [[f64; 18]; 32],
        synthesis: ReferenceSynthesis,
    }

    impl ReferenceDecoder {
        fn new() -> Self {
            ReferenceDecoder { overlap: [[0.0; 18]; 32], synthesis: ReferenceSynthesis::new() }
        }

        fn long_window(block: Block, i: usize) -> f64 {
            let long = (PI / 36.0 * (i as f64 + 0.5)).sin();

            match (block, i) {
                (Block::Start, 18..=23) | (Block::End, 12..=17) => 1.0,
                (Block::Start, 24..=29) => (PI / 12.0 * ((i - 18) as f64 + 0.5)).sin(),
                (Block::Start, 30..=35) | (Block::End, 0..=5) => 0.0,
                (Block::End, 6..=11) => (PI / 12.0 * ((i - 6) as f64 + 0.5)).sin(),
                _ => long,
            }
        }

        fn decode(&mut self, gr: &Granule) -> Vec<f32> {
            let long_bands = &SFB_LONG_BANDS[0];
            let short_bands = &SFB_SHORT_WINDOW_BANDS[0];

            let (n_long_sb, first_short_sfb) = match gr.block {
                Block::Short => (0, 0),
                Block::Mixed => (2, 3),
                _ => (32, 13),
            };

            let gain = f64::from(gr.global_gain) - 210.0;

            // Requantized lines of the long sub-bands.
            let mut xr = [0f64; 576];

            for sfb in 0..22 {
                let scale = 2f64.powf(0.25 * gain - 0.5 * f64::from(gr.long_sf[sfb]));

                for i in long_bands[sfb]..long_bands[sfb + 1] {
                    if i < 18 * n_long_sb {
                        xr[i] = scale * f64::from(gr.values[i]);
                    }
                }
            }

            // Requantized lines of each short window. Within a band, the coded samples of the three
            // windows follow each other.
            let mut win_xr = [[0f64; 192]; 3];

            for sfb in first_short_sfb..13 {
                let start = short_bands[sfb];
                let width = short_bands[sfb + 1] - start;

                for (win, lines) in win_xr.iter_mut().enumerate() {
                    let exp = gain - 8.0 * f64::from(gr.subblock_gain[win]);
                    let scale = 2f64.powf(0.25 * exp - 0.5 * f64::from(gr.short_sf[sfb][win]));

                    let coded = &gr.values[3 * start + win * width..][..width];

                    for (line, &v) in lines[start..start + width].iter_mut().zip(coded) {
                        *line = scale * f64::from(v);
                    }
                }
            }

            // Alias reduction between adjacent long sub-bands.
            const C: [f64; 8] = [-0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037];

            for sb in 1..n_long_sb {
                for (i, c) in C.iter().enumerate() {
                    let cs = 1.0 / (1.0 + c * c).sqrt();
                    let ca = c / (1.0 + c * c).sqrt();

                    let lower = xr[18 * sb - 1 - i];
                    let upper = xr[18 * sb + i];

                    xr[18 * sb - 1 - i] = lower * cs - upper * ca;
                    xr[18 * sb + i] = upper * cs + lower * ca;
                }
            }

            let mut time = [[0f64; 18]; 32];

            for (sb, out) in time.iter_mut().enumerate() {
                let mut z = [0f64; 36];

                if sb < n_long_sb {
                    let block = if gr.block == Block::Mixed { Block::Long } else { gr.block };

                    for (i, zi) in z.iter_mut().enumerate() {
                        let y: f64 = (0..18)
                            .map(|k| {
                                let n = ((2 * i + 1 + 18) * (2 * k + 1)) as f64;
                                xr[18 * sb + k] * (PI / 72.0 * n).cos()
                            })
                            .sum();

                        *zi = y * Self::long_window(block, i);
                    }
                }
                else {
                    for (w, lines) in win_xr.iter().enumerate() {
                        for i in 0..12 {
                            let y: f64 = (0..6)
                                .map(|k| {
                                    let n = ((2 * i + 1 + 6) * (2 * k + 1)) as f64;
                                    lines[6 * sb + k] * (PI / 24.0 * n).cos()
                                })
                                .sum();

                            z[6 + 6 * w + i] += y * (PI / 12.0 * (i as f64 + 0.5)).sin();
                        }
                    }
                }

                for i in 0..18 {
                    out[i] = z[i] + self.overlap[sb][i];
                    self.overlap[sb][i] = z[i + 18];

                    // Frequency inversion of odd samples in odd sub-bands.
                    if sb % 2 == 1 && i % 2 == 1 {
                        out[i] = -out[i];
                    }
                }
            }

            let mut pcm = Vec::with_capacity(576);

            for t in 0..18 {
                let mut s = [0f32; 32];
                for (sb, s) in s.iter_mut().enumerate() {
                    *s = time[sb][t] as f32;
                }

                pcm.extend_from_slice(&self.synthesis.synthesize(&s));
            }

            pcm
        }
    }

    #[test]
    fn verify_block_types_match_reference() {
        let mut rng = SmallRng::seed_from_u64(41);

        let frames = [
            [Block::Long, Block::Start],
            [Block::Short, Block::Mixed],
            [Block::Short, Block::End],
            [Block::Mixed, Block::Long],
        ];

        let header = parse_frame_header(HEADER_WORD).unwrap();

        let mut decoder = MpaDecoder::new(&DecoderOptions::default());
        let mut reference = ReferenceDecoder::new();
        let mut sink = CaptureSink::default();

        for blocks in frames {
            let granules = blocks.map(|block| Granule::random(&mut rng, block));

            let data = build_frame(&granules);
            let frame = Frame { header, header_word: HEADER_WORD, data: &data };

            let status = decoder.decode(&frame, &mut sink).unwrap();
            assert!(!status.skipped);

            let expected: Vec<f32> = granules.iter().flat_map(|gr| reference.decode(gr)).collect();

            assert_eq!(sink.samples.len(), expected.len());

            // Within one 16-bit step.
            for (i, (a, e)) in sink.samples.iter().zip(&expected).enumerate() {
                assert!((a - e).abs() < 1.0, "{:?} sample {}: {} != {}", blocks, i, a, e);
            }

            let peak = expected.iter().fold(0f32, |peak, s| peak.max(s.abs()));
            assert!(peak > 100.0);
        }
    }
}
