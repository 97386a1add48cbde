//! H.264 byte-stream to AVC parser.
//!
//! Converts H.264 access units from Annex B byte-stream form (NAL units
//! separated by `00 00 00 01`) to AVC form (NAL units prefixed by a 4-byte
//! big-endian length), the layout expected by MP4/ISO-BMFF muxers. SPS and PPS
//! are moved out of band into an avcC configuration record published once per
//! stream, or again whenever the output format changes.
//!
//! # Quick Start
//!
//! ```
//! use h264parse::{AccessUnit, H264Parse, LatestFormat, VideoFormat};
//!
//! let mut parser = H264Parse::builder().single_nalu(false).build();
//! parser.set_formats(VideoFormat::byte_stream(), VideoFormat::avc());
//! parser.start();
//!
//! let mut au = AccessUnit::from_slice(&[
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xc0, 0x1e, // SPS
//!     0x00, 0x00, 0x00, 0x01, 0x68, 0xce, 0x3c, 0x80, // PPS
//!     0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, // IDR slice
//! ]);
//! let mut sink = LatestFormat::new();
//! parser.process(&mut au, &mut sink)?;
//!
//! assert_eq!(au.map_readable()?, &[0x00, 0x00, 0x00, 0x04, 0x65, 0x88, 0x84, 0x21]);
//! assert!(sink.format().and_then(|f| f.codec_data.as_ref()).is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The bitstream primitives live in the `h264parse-bitstream` crate and are
//! re-exported here.

pub mod buffer;
pub mod format;
mod parse;
mod sink;
pub mod splitter;

pub use buffer::AccessUnit;
pub use format::{transform_formats, PadDirection, StreamFormat, VideoFormat};
pub use parse::{H264Parse, H264ParseBuilder, Settings};
pub use sink::{ConfigurationSink, LatestFormat};
pub use splitter::{split_access_units, AccessUnitSplitter};

pub use h264parse_bitstream::{
    build_configuration, locate_header, rewrite_in_place, scan, ConfigurationRecord,
    ConfigurationUpdate, HeaderLocation, NalUnit, NalUnitType, ParseError, Rewritten,
    StreamState, NAL_LENGTH_SIZE,
};
