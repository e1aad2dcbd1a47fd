// Cadence Decode Tool
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Justification: Fields on DecoderOptions may change at any time, but cadence-decode doesn't want
// to be updated every time those fields change, therefore always fill in the remaining fields with
// default values.
#![allow(clippy::needless_update)]

mod wav;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use cadence_bundle_mp3::{Decoder, DecoderOptions, Equalizer, FrameHeader, OutputChannels};
use cadence_core::audio::{SampleBuffer, MAX_CHANNELS};
use cadence_core::checksum::{Md5, Monitor};
use cadence_core::errors::{Error, Result};

use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use crate::wav::WavWriter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Headerless interleaved 16-bit little-endian PCM.
    Raw,
    /// 16-bit PCM RIFF/WAVE.
    Wav,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ChannelSelection {
    Both,
    Left,
    Right,
    Downmix,
}

impl From<ChannelSelection> for OutputChannels {
    fn from(selection: ChannelSelection) -> Self {
        match selection {
            ChannelSelection::Both => OutputChannels::Both,
            ChannelSelection::Left => OutputChannels::Left,
            ChannelSelection::Right => OutputChannels::Right,
            ChannelSelection::Downmix => OutputChannels::Downmix,
        }
    }
}

/// Decode MPEG audio Layer I, II and III streams
#[derive(Parser, Debug)]
#[command(name = "Cadence Decode", version, about)]
struct Args {
    /// The input file path
    input: PathBuf,

    /// Write the decoded audio to this path
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// The output file format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Wav)]
    format: OutputFormat,

    /// The channels to decode
    #[arg(long, short = 'c', value_enum, default_value_t = ChannelSelection::Both)]
    channels: ChannelSelection,

    /// Comma separated equalizer settings for up to 32 sub-bands, each in [-1, 1]
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    eq: Vec<f32>,

    /// Reject frames failing their CRC check
    #[arg(long)]
    verify_crc: bool,

    /// Print the MD5 hash of the decoded PCM
    #[arg(long)]
    md5: bool,

    /// Print the stream report as JSON
    #[arg(long)]
    json: bool,
}

/// The summary of a decoded stream.
#[derive(Default, Serialize)]
struct Report {
    version: String,
    layer: String,
    sample_rate: u32,
    bitrate: u32,
    channel_mode: String,
    output_channels: usize,
    frames: u64,
    skipped_frames: u64,
    rejected_frames: u64,
    crc_mismatches: u64,
    samples: u64,
    duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    md5: Option<String>,
}

impl Report {
    fn set_stream_params(&mut self, header: &FrameHeader, output_channels: usize) {
        self.version = format!("{:?}", header.version);
        self.layer = format!("{:?}", header.layer);
        self.sample_rate = header.sample_rate;
        self.bitrate = header.bitrate;
        self.channel_mode = format!("{:?}", header.channel_mode);
        self.output_channels = output_channels;
    }

    fn print(&self) {
        println!("Stream");
        println!("=================================================");
        println!();
        println!("  Format:            {} {}", self.version, self.layer);
        println!("  Sample Rate:       {} Hz", self.sample_rate);
        println!("  Bitrate:           {} kbps", self.bitrate / 1000);
        println!("  Channel Mode:      {}", self.channel_mode);
        println!("  Output Channels:   {}", self.output_channels);
        println!();
        println!("  Frames:            {:>12}", self.frames);
        println!("  Skipped Frames:    {:>12}", self.skipped_frames);
        println!("  Rejected Frames:   {:>12}", self.rejected_frames);
        println!("  CRC Mismatches:    {:>12}", self.crc_mismatches);
        println!("  Samples:           {:>12}", self.samples);
        println!("  Duration:          {:>12.3} s", self.duration_ms / 1000.0);

        if let Some(md5) = &self.md5 {
            println!("  MD5:               {}", md5);
        }

        println!();
    }
}

/// The destination of the decoded PCM.
enum Sink {
    Wav(WavWriter<BufWriter<File>>),
    Raw(BufWriter<File>),
}

impl Sink {
    fn write_pcm(&mut self, pcm: &[u8]) -> Result<()> {
        match self {
            Sink::Wav(writer) => writer.write_pcm(pcm)?,
            Sink::Raw(writer) => writer.write_all(pcm)?,
        }
        Ok(())
    }

    fn finalize(self) -> Result<()> {
        match self {
            Sink::Wav(writer) => {
                writer.finalize()?;
            }
            Sink::Raw(mut writer) => writer.flush()?,
        }
        Ok(())
    }
}

fn open_sink(args: &Args, header: &FrameHeader, n_channels: usize) -> Result<Option<Sink>> {
    let path = match &args.output {
        Some(path) => path,
        None => return Ok(None),
    };

    let file = BufWriter::new(File::create(path)?);

    let sink = match args.format {
        OutputFormat::Wav => {
            Sink::Wav(WavWriter::new(file, header.sample_rate, n_channels as u16)?)
        }
        OutputFormat::Raw => Sink::Raw(file),
    };

    Ok(Some(sink))
}

/// Copies the samples of the output channels out of the sample buffer as little-endian bytes.
fn copy_pcm(buf: &SampleBuffer, n_channels: usize, pcm: &mut Vec<u8>) {
    pcm.clear();

    for frame in buf.samples().chunks_exact(MAX_CHANNELS) {
        for sample in &frame[..n_channels] {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
}

fn run(args: &Args) -> Result<Report> {
    let options = DecoderOptions {
        equalizer: (!args.eq.is_empty()).then(|| Equalizer::from_settings(&args.eq)),
        output_channels: args.channels.into(),
        verify_crc: args.verify_crc,
        ..Default::default()
    };

    let file = BufReader::new(File::open(&args.input)?);

    let mut decoder = Decoder::new(file, &options);

    // The sample buffer always holds two channels. A single output channel occupies the first.
    let mut buf = SampleBuffer::new(0, MAX_CHANNELS);
    let mut pcm = Vec::new();

    let mut md5 = if args.md5 { Some(Md5::default()) } else { None };
    let mut sink = None;
    let mut report = Report::default();

    while let Some(frame) = decoder.decode_frame(&mut buf)? {
        if report.frames == 0 {
            info!(
                "decoding {:?} {:?} at {} Hz to {} channel(s)",
                frame.header.version, frame.header.layer, frame.header.sample_rate, frame.channels
            );

            report.set_stream_params(&frame.header, frame.channels);
            sink = open_sink(args, &frame.header, frame.channels)?;
        }

        report.frames += 1;
        report.duration_ms += frame.header.ms_per_frame();

        if frame.crc_mismatch {
            report.crc_mismatches += 1;
        }

        if frame.skipped {
            report.skipped_frames += 1;
            continue;
        }

        report.samples += frame.samples() as u64;

        // The channel count of the output is fixed by the first frame.
        copy_pcm(&buf, report.output_channels, &mut pcm);

        if let Some(md5) = md5.as_mut() {
            md5.process_buf_bytes(&pcm);
        }

        if let Some(sink) = sink.as_mut() {
            sink.write_pcm(&pcm)?;
        }
    }

    report.rejected_frames = decoder.frames_rejected();
    report.md5 = md5.map(|md5| md5.md5().iter().map(|b| format!("{:02x}", b)).collect());

    if let Some(sink) = sink {
        sink.finalize()?;
    }

    Ok(report)
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(err) => {
                        eprintln!("Failed to serialize the report: {}", err);
                        std::process::exit(1);
                    }
                }
            }
            else {
                println!("Input Path: {}", args.input.display());
                println!();
                report.print();
            }

            if report.frames == 0 {
                eprintln!("No MPEG audio frames found.");
                std::process::exit(1);
            }
        }
        Err(Error::IoError(err)) => {
            eprintln!("IO error: {}", err);
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("Decoding interrupted by error: {}", err);
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::audio::OutputSink;

    use super::*;

    #[test]
    fn verify_copy_pcm() {
        let mut buf = SampleBuffer::new(44_100, 2);

        let mut left = [0f32; 32];
        let mut right = [0f32; 32];

        for i in 0..32 {
            left[i] = i as f32;
            right[i] = -(i as f32);
        }

        buf.append_samples(0, &left);
        buf.append_samples(1, &right);

        let mut pcm = Vec::new();

        copy_pcm(&buf, 2, &mut pcm);
        assert_eq!(pcm.len(), 128);
        assert_eq!(&pcm[4..8], &[1, 0, 0xff, 0xff]);

        copy_pcm(&buf, 1, &mut pcm);
        assert_eq!(pcm.len(), 64);
        assert_eq!(&pcm[2..6], &[1, 0, 2, 0]);
    }

    #[test]
    fn verify_args() {
        let args = Args::try_parse_from([
            "cadence-decode",
            "in.mp3",
            "-o",
            "out.raw",
            "--format",
            "raw",
            "--channels",
            "downmix",
            "--eq",
            "-1,0.5,0",
            "--md5",
        ])
        .unwrap();

        assert_eq!(args.input, PathBuf::from("in.mp3"));
        assert_eq!(args.format, OutputFormat::Raw);
        assert_eq!(OutputChannels::from(args.channels), OutputChannels::Downmix);
        assert_eq!(args.eq, vec![-1.0, 0.5, 0.0]);
        assert!(args.md5);
        assert!(!args.json);
    }
}
