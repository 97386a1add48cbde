//! Annex B NAL unit scanning.
//!
//! NAL units are delimited by the 4-byte start code `00 00 00 01`. The scanner
//! feeds every byte through a 32-bit shift register and reports a boundary
//! whenever the register equals the start code. Three-byte start codes are not
//! recognized, and a start code needs at least four bytes after it (the NAL
//! header plus three payload bytes) to be reported.

use std::ops::Range;

/// The Annex B start code as a big-endian word.
pub const START_CODE: u32 = 0x0000_0001;

/// Length in bytes of both the start code and the AVC length prefix.
pub const NAL_LENGTH_SIZE: usize = 4;

/// H.264 NAL unit type, taken from the low 5 bits of the NAL header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// Unspecified (0).
    Unknown,
    /// Coded slice of a non-IDR picture (1).
    Slice,
    /// Coded slice of an IDR picture (5).
    SliceIdr,
    /// Supplemental enhancement information (6).
    Sei,
    /// Sequence parameter set (7).
    Sps,
    /// Picture parameter set (8).
    Pps,
    /// Any other type, raw value kept.
    Other(u8),
}

impl NalUnitType {
    /// Classify a NAL header byte.
    #[must_use]
    pub fn from_header(byte: u8) -> Self {
        match byte & 0x1f {
            0 => Self::Unknown,
            1 => Self::Slice,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            n => Self::Other(n),
        }
    }

    /// Returns the numeric nal_unit_type.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Slice => 1,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Other(n) => n,
        }
    }

    /// Returns true for coded slices (IDR or non-IDR).
    #[must_use]
    pub fn is_slice(self) -> bool {
        matches!(self, Self::Slice | Self::SliceIdr)
    }

    /// Returns true for SPS and PPS.
    #[must_use]
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

/// Location of one NAL unit inside a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit {
    /// NAL unit type.
    pub kind: NalUnitType,
    /// Index of the NAL header byte (first byte after the start code).
    pub offset: usize,
    /// Size in bytes, header included, start codes excluded.
    pub size: usize,
}

impl NalUnit {
    /// Index of the first byte of this NAL's start code.
    ///
    /// `None` if `offset` leaves no room for a start code.
    #[must_use]
    pub fn start_code_offset(&self) -> Option<usize> {
        self.offset.checked_sub(NAL_LENGTH_SIZE)
    }

    /// Byte range of the NAL (header included), `None` on overflow.
    #[must_use]
    pub fn range(&self) -> Option<Range<usize>> {
        let end = self.offset.checked_add(self.size)?;
        Some(self.offset..end)
    }

    /// Returns the NAL bytes, or `None` if the unit does not fit in `buffer`.
    #[must_use]
    pub fn data<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        buffer.get(self.range()?)
    }
}

/// Rolling start-code matcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StartCodeMatcher {
    state: u32,
}

impl StartCodeMatcher {
    pub(crate) fn new() -> Self {
        // Seeded with a pattern that cannot match before four real bytes are read.
        Self { state: !START_CODE }
    }

    /// Shift in one byte; returns true if the last four bytes form a start code.
    #[inline]
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        self.state = (self.state << 8) | u32::from(byte);
        self.state == START_CODE
    }
}

/// Number of leading byte positions the scanner examines.
#[inline]
pub(crate) fn scan_limit(len: usize) -> usize {
    len.saturating_sub(NAL_LENGTH_SIZE)
}

/// Iterator over the NAL units of an Annex B buffer.
///
/// Created by [`scan`].
#[derive(Debug, Clone)]
pub struct NalScanner<'a> {
    data: &'a [u8],
    matcher: StartCodeMatcher,
    pos: usize,
    pending: Option<(NalUnitType, usize)>,
}

impl Iterator for NalScanner<'_> {
    type Item = NalUnit;

    fn next(&mut self) -> Option<NalUnit> {
        let limit = scan_limit(self.data.len());

        while self.pos < limit {
            let i = self.pos;
            self.pos += 1;

            if !self.matcher.push(self.data[i]) {
                continue;
            }

            let kind = NalUnitType::from_header(self.data[i + 1]);
            tracing::trace!("start code at {}, NAL type {}", i - 3, kind.as_u8());

            if let Some((prev_kind, offset)) = self.pending.replace((kind, i + 1)) {
                // Consecutive matches are at least four bytes apart.
                return Some(NalUnit {
                    kind: prev_kind,
                    offset,
                    size: (i - 3).saturating_sub(offset),
                });
            }
        }

        self.pending.take().map(|(kind, offset)| NalUnit {
            kind,
            offset,
            size: self.data.len() - offset,
        })
    }
}

/// Scan `data` for NAL units delimited by 4-byte start codes.
///
/// Bytes before the first start code are not reported. Scanning never fails:
/// a buffer without start codes yields nothing.
pub fn scan(data: &[u8]) -> NalScanner<'_> {
    NalScanner {
        data,
        matcher: StartCodeMatcher::new(),
        pos: 0,
        pending: None,
    }
}

/// Parameter sets found ahead of the first slice of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    /// First SPS before the first slice.
    pub sps: Option<NalUnit>,
    /// First PPS before the first slice.
    pub pps: Option<NalUnit>,
    /// Offset of the first slice's start code, or the buffer length when no
    /// slice was found.
    pub header_size: usize,
}

impl HeaderLocation {
    /// Returns true if both an SPS and a PPS were found.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// Returns true if a slice follows the header.
    #[must_use]
    pub fn has_slice(&self, buffer_len: usize) -> bool {
        self.header_size < buffer_len
    }
}

/// Locate the SPS/PPS region at the head of an access unit.
///
/// Only the first SPS and the first PPS are kept; later ones before the first
/// slice are ignored.
pub fn locate_header(data: &[u8]) -> HeaderLocation {
    let mut location = HeaderLocation {
        sps: None,
        pps: None,
        header_size: data.len(),
    };

    for nal in scan(data) {
        match nal.kind {
            NalUnitType::Sps if location.sps.is_none() => location.sps = Some(nal),
            NalUnitType::Pps if location.pps.is_none() => location.pps = Some(nal),
            kind if kind.is_slice() => {
                // Scanned units always follow a full start code.
                location.header_size = nal.start_code_offset().unwrap_or(nal.offset);
                break;
            }
            _ => {}
        }
    }

    tracing::trace!(
        "header: sps={:?} pps={:?} header_size={}",
        location.sps,
        location.pps,
        location.header_size
    );

    location
}
