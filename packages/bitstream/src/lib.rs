//! H.264 byte-stream to AVC conversion primitives for h264parse.
//!
//! This crate holds the pure bitstream side of the converter:
//!
//! - **Scanning** ([`scan`], [`locate_header`]): find NAL unit boundaries
//!   delimited by 4-byte Annex B start codes.
//! - **Configuration records** ([`build_configuration`]): serialize the first
//!   SPS/PPS pair into an avcC record carried out of band.
//! - **Rewriting** ([`rewrite_in_place`]): replace each start code with a
//!   4-byte big-endian length, dropping leading parameter sets.
//!
//! # Example
//!
//! ```
//! use h264parse_bitstream::{rewrite_in_place, StreamState};
//!
//! let mut au = vec![
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xc0, 0x1e, // SPS
//!     0x00, 0x00, 0x00, 0x01, 0x68, 0xce, 0x3c, 0x80, // PPS
//!     0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, // IDR slice
//! ];
//!
//! let mut state = StreamState::new(false);
//! let update = state.extract_configuration(&au).unwrap();
//! assert_eq!(update.record.len(), 11 + 4 + 4);
//!
//! let result = rewrite_in_place(&mut au, &state).unwrap();
//! assert_eq!(&au[result.start..], &[0x00, 0x00, 0x00, 0x04, 0x65, 0x88, 0x84, 0x21]);
//! ```
//!
//! Parameter sets are treated as opaque: emulation prevention bytes are not
//! removed, and only the first SPS and PPS ahead of the first slice are used.

mod error;
mod nal;
mod record;
mod rewrite;
mod state;

pub use error::ParseError;
pub use nal::{
    locate_header, scan, HeaderLocation, NalScanner, NalUnit, NalUnitType, NAL_LENGTH_SIZE,
    START_CODE,
};
pub use record::{
    build_configuration, ConfigurationRecord, MIN_PPS_SIZE, MIN_SPS_SIZE, RECORD_OVERHEAD,
};
pub use rewrite::{rewrite_in_place, Rewritten};
pub use state::{ConfigurationUpdate, StreamState};
