// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use std::io::{Cursor, Read, SeekFrom};

use cadence_bundle_mp3::{Decoder, DecoderOptions, Mp3Stream, OutputChannels};
use cadence_core::audio::SampleBuffer;

use common::*;

fn read_to_end<R: Read>(stream: &mut Mp3Stream<R>) -> Vec<u8> {
    let mut pcm = Vec::new();
    let mut out = [0u8; 4096];

    loop {
        match stream.read(&mut out).unwrap() {
            0 => break,
            len => pcm.extend_from_slice(&out[..len]),
        }
    }

    pcm
}

fn to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
}

#[test]
fn verify_stereo_stream() {
    let data = random_stream(20, MPEG1_STEREO, 5);

    let mut stream = Mp3Stream::new(Cursor::new(data.clone())).unwrap();

    assert_eq!(stream.sample_rate(), 44_100);
    assert_eq!(stream.channels(), 2);

    let pcm = read_to_end(&mut stream);

    assert!(stream.is_eof());
    assert_eq!(pcm.len(), 5 * 1152 * 4);

    // The stream yields the same samples as the frame decoder.
    let mut decoder = Decoder::new(Cursor::new(data), &Default::default());
    let mut buf = SampleBuffer::new(44_100, 2);
    let mut expected = Vec::new();

    while decoder.decode_frame(&mut buf).unwrap().is_some() {
        expected.extend_from_slice(buf.samples());
    }

    assert_eq!(to_samples(&pcm), expected);
}

#[test]
fn verify_mono_stream_is_doubled() {
    let mut stream = Mp3Stream::new(Cursor::new(random_stream(21, MPEG1_MONO, 3))).unwrap();

    assert_eq!(stream.channels(), 1);

    let pcm = read_to_end(&mut stream);

    assert_eq!(pcm.len(), 3 * 1152 * 4);

    for frame in pcm.chunks_exact(4) {
        assert_eq!(frame[..2], frame[2..]);
    }

    assert!(pcm.iter().any(|&b| b != 0));
}

#[test]
fn verify_single_output_channel_is_doubled() {
    let data = random_stream(22, MPEG1_STEREO, 3);

    let options = DecoderOptions { output_channels: OutputChannels::Right, ..Default::default() };

    let mut right = Mp3Stream::with_options(Cursor::new(data.clone()), &options).unwrap();
    let mut both = Mp3Stream::new(Cursor::new(data)).unwrap();

    let right = read_to_end(&mut right);
    let both = read_to_end(&mut both);

    assert_eq!(right.len(), both.len());

    for (r, b) in right.chunks_exact(4).zip(both.chunks_exact(4)) {
        assert_eq!(r[..2], b[2..]);
        assert_eq!(r[2..], b[2..]);
    }
}

#[test]
fn verify_reads_return_whole_sample_frames() {
    let data = random_stream(23, MPEG1_STEREO, 2);

    let expected = read_to_end(&mut Mp3Stream::new(Cursor::new(data.clone())).unwrap());

    let mut stream = Mp3Stream::new(Cursor::new(data)).unwrap();
    let mut pcm = Vec::new();
    let mut out = [0u8; 1023];

    loop {
        let len = stream.read(&mut out).unwrap();

        if len == 0 {
            break;
        }

        assert_eq!(len % 4, 0);
        pcm.extend_from_slice(&out[..len]);
    }

    assert_eq!(pcm, expected);

    let mut stream = Mp3Stream::new(Cursor::new(random_stream(24, MPEG1_STEREO, 1))).unwrap();
    assert_eq!(stream.read(&mut []).unwrap(), 0);
    assert!(!stream.is_eof());
}

#[test]
fn verify_reads_smaller_than_a_sample_frame() {
    let data = random_stream(28, MPEG1_STEREO, 2);

    let expected = read_to_end(&mut Mp3Stream::new(Cursor::new(data.clone())).unwrap());

    // Read with 1, 2, and 3 byte buffers in turn, interleaved with a large read.
    let mut stream = Mp3Stream::new(Cursor::new(data)).unwrap();
    let mut pcm = Vec::new();
    let mut out = [0u8; 1000];

    for i in 0.. {
        let size = match i % 4 {
            3 => out.len(),
            n => n + 1,
        };

        let len = stream.read(&mut out[..size]).unwrap();

        if len == 0 {
            break;
        }

        // Small reads are only ever cut short at the end of the stream.
        assert!(size >= 4 || len == size || stream.is_eof());
        pcm.extend_from_slice(&out[..len]);
    }

    assert!(stream.is_eof());
    assert_eq!(pcm, expected);

    // Single byte reads from the start yield the same bytes.
    let mut stream = Mp3Stream::new(Cursor::new(random_stream(28, MPEG1_STEREO, 2))).unwrap();
    let mut byte = [0u8; 1];
    let mut pcm = Vec::new();

    while stream.read(&mut byte).unwrap() == 1 {
        pcm.push(byte[0]);
    }

    assert_eq!(pcm, expected);
}

#[test]
fn verify_stream_without_frames() {
    let err = Mp3Stream::new(Cursor::new(garbage(25, 2048))).err().unwrap();
    assert!(err.is_end_of_stream());
}

#[test]
fn verify_decode_frames() {
    let mut stream = Mp3Stream::new(Cursor::new(random_stream(26, MPEG1_STEREO, 6))).unwrap();

    // The first frame is decoded on instantiation.
    assert_eq!(stream.decode_frames(3).unwrap(), 3);
    assert_eq!(stream.decode_frames(10).unwrap(), 2);
    assert!(stream.is_eof());
    assert_eq!(stream.decoder().frames_decoded(), 6);
}

#[test]
fn verify_stream_reset() {
    let data = random_stream(27, MPEG1_STEREO, 4);

    let mut stream = Mp3Stream::new(Cursor::new(data)).unwrap();

    let first = read_to_end(&mut stream);

    stream.reset().unwrap();
    assert!(!stream.is_eof());

    let second = read_to_end(&mut stream);

    assert_eq!(first, second);

    // Seeking to the start of the third frame yields the samples of the last two frames, with the
    // first of them decoded without the overlap of its predecessor.
    let pos = 2 * frame_len(MPEG1_STEREO) as u64;
    assert_eq!(stream.seek(SeekFrom::Start(pos)).unwrap(), pos);

    let tail = read_to_end(&mut stream);

    assert_eq!(tail.len(), 2 * 1152 * 4);
}
