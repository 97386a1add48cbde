//! Access-unit buffers handed to the parser.
//!
//! An [`AccessUnit`] is made of one or more memory segments. The in-place
//! rewrite only works on a single, writable, contiguous segment; anything else
//! fails to map and must be flattened by the caller first.

use bytes::{Buf, Bytes, BytesMut};
use h264parse_bitstream::ParseError;

/// One coded picture worth of H.264 data plus its buffer flags.
#[derive(Debug, Clone)]
pub struct AccessUnit {
    segments: Vec<BytesMut>,
    writable: bool,
    delta_unit: bool,
    pts_us: Option<u64>,
}

impl AccessUnit {
    /// Wrap a single writable segment.
    pub fn new(data: BytesMut) -> Self {
        Self::from_segments(vec![data])
    }

    /// Copy `data` into a new single-segment access unit.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(BytesMut::from(data))
    }

    /// Build an access unit from several memory segments.
    pub fn from_segments(segments: Vec<BytesMut>) -> Self {
        Self {
            segments,
            writable: true,
            delta_unit: false,
            pts_us: None,
        }
    }

    /// Mark the buffer read-only; mapping it writable will fail.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Set the presentation timestamp in microseconds.
    #[must_use]
    pub fn with_pts(mut self, pts_us: u64) -> Self {
        self.pts_us = Some(pts_us);
        self
    }

    /// Set the initial delta-unit flag.
    #[must_use]
    pub fn with_delta_unit(mut self, delta_unit: bool) -> Self {
        self.delta_unit = delta_unit;
        self
    }

    /// Total size of all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(BytesMut::len).sum()
    }

    /// Returns true if no segment holds any data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of memory segments.
    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    /// Presentation timestamp in microseconds.
    pub fn pts_us(&self) -> Option<u64> {
        self.pts_us
    }

    /// Returns true if the unit depends on earlier pictures.
    pub fn is_delta_unit(&self) -> bool {
        self.delta_unit
    }

    /// Set or clear the delta-unit flag.
    pub fn set_delta_unit(&mut self, delta_unit: bool) {
        self.delta_unit = delta_unit;
    }

    /// Borrow the single contiguous segment for reading.
    pub fn map_readable(&self) -> Result<&[u8], ParseError> {
        match self.segments.as_slice() {
            [segment] => Ok(&segment[..]),
            [] => Err(ParseError::unmappable("buffer has no memory")),
            many => Err(ParseError::unmappable(format!(
                "buffer spans {} memory segments",
                many.len()
            ))),
        }
    }

    /// Borrow the single contiguous segment for in-place modification.
    pub fn map_writable(&mut self) -> Result<&mut BytesMut, ParseError> {
        if !self.writable {
            return Err(ParseError::unmappable("buffer is read-only"));
        }
        match self.segments.as_mut_slice() {
            [segment] => Ok(segment),
            [] => Err(ParseError::unmappable("buffer has no memory")),
            many => Err(ParseError::unmappable(format!(
                "buffer spans {} memory segments",
                many.len()
            ))),
        }
    }

    /// Copy all segments into one writable segment.
    pub fn flatten(&mut self) {
        if self.segments.len() == 1 && self.writable {
            return;
        }
        let mut merged = BytesMut::with_capacity(self.len());
        for segment in &self.segments {
            merged.extend_from_slice(segment);
        }
        self.segments = vec![merged];
        self.writable = true;
    }

    /// Drop `count` bytes from the front of the single segment without copying.
    pub fn trim_front(&mut self, count: usize) -> Result<(), ParseError> {
        if count == 0 {
            return Ok(());
        }
        let segment = self.map_writable()?;
        if count > segment.len() {
            return Err(ParseError::OutOfBounds {
                offset: count,
                len: segment.len(),
            });
        }
        segment.advance(count);
        Ok(())
    }

    /// Freeze the contents into one immutable buffer.
    pub fn into_bytes(mut self) -> Bytes {
        if self.segments.len() == 1 {
            return self.segments.remove(0).freeze();
        }
        let mut merged = BytesMut::with_capacity(self.len());
        for segment in &self.segments {
            merged.extend_from_slice(segment);
        }
        merged.freeze()
    }
}
