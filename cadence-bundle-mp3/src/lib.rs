// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cadence crates. Please see the workspace Cargo.toml for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

// Shared modules.
mod common;
mod equalizer;
mod header;

// Frame synchronization module.
mod reader;

// Decoder modules.
#[cfg(any(feature = "mp1", feature = "mp2", feature = "mp3"))]
mod decoder;
#[cfg(any(feature = "mp1", feature = "mp2", feature = "mp3"))]
mod stream;
#[cfg(any(feature = "mp1", feature = "mp2", feature = "mp3"))]
mod synthesis;

// Shared layer 1 & 2 decoder support module.
#[cfg(any(feature = "mp1", feature = "mp2"))]
mod layer12;

// Layer-specific decoder support modules.
#[cfg(feature = "mp1")]
mod layer1;
#[cfg(feature = "mp2")]
mod layer2;
#[cfg(feature = "mp3")]
mod layer3;

pub use common::{ChannelMode, Emphasis, FrameHeader, Mode, MpegLayer, MpegVersion};
pub use common::{FrameStatus, OutputChannels};
pub use equalizer::{Equalizer, BAND_NOT_PRESENT, EQ_BANDS};
pub use header::{parse_frame_header, SyncMode, MAX_MPEG_FRAME_SIZE};
pub use reader::{Frame, FrameReader};

#[cfg(any(feature = "mp1", feature = "mp2", feature = "mp3"))]
pub use decoder::{Decoder, DecoderOptions, FrameInfo, MpaDecoder};
#[cfg(any(feature = "mp1", feature = "mp2", feature = "mp3"))]
pub use stream::Mp3Stream;
