//! Splitting an Annex B elementary stream into access units.
//!
//! The parser expects one access unit per buffer. Raw `.h264` files are a
//! single stream of NAL units, so the command-line tool cuts them first.

use std::ops::Range;

use h264parse_bitstream::{scan, NalUnit, NalUnitType};

/// nal_unit_type of an access unit delimiter.
const ACCESS_UNIT_DELIMITER: u8 = 9;

/// Groups NAL units into access units.
///
/// A new access unit starts at:
/// - an AUD, SEI, SPS or PPS following a slice, or
/// - a slice with `first_mb_in_slice == 0` following a slice.
#[derive(Debug, Default)]
pub struct AccessUnitSplitter {
    start: usize,
    seen_slice: bool,
}

impl AccessUnitSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next NAL unit of `data`.
    ///
    /// Returns the byte range of the access unit that this NAL closes.
    pub fn push(&mut self, data: &[u8], nal: &NalUnit) -> Option<Range<usize>> {
        if !self.seen_slice {
            self.seen_slice = nal.kind.is_slice();
            return None;
        }

        let boundary = match nal.kind {
            NalUnitType::Sps | NalUnitType::Pps | NalUnitType::Sei => true,
            NalUnitType::Other(ACCESS_UNIT_DELIMITER) => true,
            kind if kind.is_slice() => first_mb_in_slice_zero(data, nal),
            _ => false,
        };
        if !boundary {
            return None;
        }

        let end = nal.start_code_offset()?;
        let au = self.start..end;
        self.start = end;
        self.seen_slice = nal.kind.is_slice();
        Some(au)
    }

    /// Close the last access unit at `end`.
    pub fn finish(self, end: usize) -> Option<Range<usize>> {
        (self.start < end).then_some(self.start..end)
    }
}

/// Returns true if the slice header starts with `first_mb_in_slice == 0`.
///
/// `first_mb_in_slice` is the first Exp-Golomb field of the header, and the
/// value 0 is coded as a single `1` bit.
fn first_mb_in_slice_zero(data: &[u8], nal: &NalUnit) -> bool {
    nal.offset
        .checked_add(1)
        .and_then(|i| data.get(i))
        .is_some_and(|byte| byte & 0x80 != 0)
}

/// Split `data` into access-unit byte ranges.
///
/// Bytes before the first start code stay with the first access unit. Data
/// without any start code comes back as a single range.
pub fn split_access_units(data: &[u8]) -> Vec<Range<usize>> {
    let mut splitter = AccessUnitSplitter::new();
    let mut units = Vec::new();

    for nal in scan(data) {
        if let Some(au) = splitter.push(data, &nal) {
            tracing::trace!("access unit {:?}", au);
            units.push(au);
        }
    }
    units.extend(splitter.finish(data.len()));

    tracing::debug!("split {} bytes into {} access units", data.len(), units.len());
    units
}
