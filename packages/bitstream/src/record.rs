//! AVC decoder configuration record (avcC).
//!
//! ```text
//!  1 byte  - configuration version (1)
//!  1 byte  - profile_idc
//!  1 byte  - profile compatibility
//!  1 byte  - level_idc
//!  6 bits  - reserved (all ones)
//!  2 bits  - NAL length size minus one (3 = 4 bytes)
//!  3 bits  - reserved (all ones)
//!  5 bits  - number of SPS (1)
//!  2 bytes - SPS length
//!  n bytes - SPS NAL unit
//!  1 byte  - number of PPS (1)
//!  2 bytes - PPS length
//!  n bytes - PPS NAL unit
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ParseError;
use crate::nal::{NalUnit, NalUnitType, NAL_LENGTH_SIZE};

/// Smallest SPS accepted: header byte plus profile, compatibility and level.
pub const MIN_SPS_SIZE: usize = 4;

/// Smallest PPS accepted: the header byte.
pub const MIN_PPS_SIZE: usize = 1;

/// Fixed bytes of a record carrying one SPS and one PPS.
pub const RECORD_OVERHEAD: usize = 11;

const CONFIGURATION_VERSION: u8 = 1;
const LENGTH_SIZE_MARKER: u8 = 0xfc | (NAL_LENGTH_SIZE as u8 - 1);
const SPS_COUNT_MARKER: u8 = 0xe0 | 1;
const PPS_COUNT: u8 = 1;

/// An immutable avcC record holding exactly one SPS and one PPS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigurationRecord {
    data: Bytes,
    sps_len: usize,
    pps_len: usize,
}

impl ConfigurationRecord {
    /// Serialized record bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Cheap clone of the serialized bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Record length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; a valid record has at least [`RECORD_OVERHEAD`] bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// profile_idc
    #[must_use]
    pub fn profile(&self) -> u8 {
        self.data[1]
    }

    /// Profile compatibility flags.
    #[must_use]
    pub fn profile_compatibility(&self) -> u8 {
        self.data[2]
    }

    /// level_idc
    #[must_use]
    pub fn level(&self) -> u8 {
        self.data[3]
    }

    /// Size of the NAL length prefix the stream uses.
    #[must_use]
    pub fn nal_length_size(&self) -> usize {
        usize::from(self.data[4] & 0x03) + 1
    }

    /// The SPS NAL unit, header byte included.
    #[must_use]
    pub fn sps(&self) -> &[u8] {
        &self.data[8..8 + self.sps_len]
    }

    /// The PPS NAL unit, header byte included.
    #[must_use]
    pub fn pps(&self) -> &[u8] {
        let start = 8 + self.sps_len + 3;
        &self.data[start..start + self.pps_len]
    }

    /// Build a record from raw SPS and PPS NAL units.
    pub fn from_parameter_sets(sps: &[u8], pps: &[u8]) -> Result<Self, ParseError> {
        if sps.len() < MIN_SPS_SIZE {
            return Err(ParseError::malformed(format!(
                "SPS too short: {} bytes",
                sps.len()
            )));
        }
        if pps.len() < MIN_PPS_SIZE {
            return Err(ParseError::malformed("empty PPS"));
        }
        if NalUnitType::from_header(sps[0]) != NalUnitType::Sps {
            return Err(ParseError::malformed(format!(
                "expected SPS, found NAL type {}",
                sps[0] & 0x1f
            )));
        }
        if NalUnitType::from_header(pps[0]) != NalUnitType::Pps {
            return Err(ParseError::malformed(format!(
                "expected PPS, found NAL type {}",
                pps[0] & 0x1f
            )));
        }
        let sps_len = u16::try_from(sps.len())
            .map_err(|_| ParseError::malformed(format!("SPS too long: {} bytes", sps.len())))?;
        let pps_len = u16::try_from(pps.len())
            .map_err(|_| ParseError::malformed(format!("PPS too long: {} bytes", pps.len())))?;

        let mut buf = BytesMut::with_capacity(RECORD_OVERHEAD + sps.len() + pps.len());

        buf.put_u8(CONFIGURATION_VERSION);
        // Profile, compatibility and level follow the SPS header byte.
        buf.put_slice(&sps[1..4]);
        buf.put_u8(LENGTH_SIZE_MARKER);

        buf.put_u8(SPS_COUNT_MARKER);
        buf.put_u16(sps_len);
        buf.put_slice(sps);

        buf.put_u8(PPS_COUNT);
        buf.put_u16(pps_len);
        buf.put_slice(pps);

        Ok(Self {
            data: buf.freeze(),
            sps_len: sps.len(),
            pps_len: pps.len(),
        })
    }

    /// Parse a serialized record.
    ///
    /// Only records carrying exactly one SPS and one PPS are accepted.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < RECORD_OVERHEAD {
            return Err(ParseError::malformed(format!(
                "configuration record too short: {} bytes",
                data.len()
            )));
        }
        if data[0] != CONFIGURATION_VERSION {
            return Err(ParseError::malformed(format!(
                "unsupported configuration version {}",
                data[0]
            )));
        }
        if data[5] & 0x1f != 1 {
            return Err(ParseError::malformed(format!(
                "expected one SPS, found {}",
                data[5] & 0x1f
            )));
        }

        let sps_len = usize::from(u16::from_be_bytes([data[6], data[7]]));
        let pps_count_at = 8 + sps_len;
        let header = data
            .get(pps_count_at..pps_count_at + 3)
            .ok_or_else(|| ParseError::malformed("configuration record truncated in SPS"))?;
        if header[0] != PPS_COUNT {
            return Err(ParseError::malformed(format!(
                "expected one PPS, found {}",
                header[0]
            )));
        }

        let pps_len = usize::from(u16::from_be_bytes([header[1], header[2]]));
        let end = pps_count_at + 3 + pps_len;
        if data.len() != end {
            return Err(ParseError::malformed(format!(
                "configuration record length {} does not match contents ({})",
                data.len(),
                end
            )));
        }

        Ok(Self {
            data: Bytes::copy_from_slice(data),
            sps_len,
            pps_len,
        })
    }
}

/// Build the configuration record from the SPS and PPS located in `buffer`.
///
/// Fails with [`ParseError::MalformedHeader`] when either unit has the wrong
/// type, is below its minimum size, or does not lie inside `buffer`.
pub fn build_configuration(
    buffer: &[u8],
    sps: &NalUnit,
    pps: &NalUnit,
) -> Result<ConfigurationRecord, ParseError> {
    if sps.kind != NalUnitType::Sps || pps.kind != NalUnitType::Pps {
        return Err(ParseError::malformed(format!(
            "unexpected H.264 header: sps type {}, pps type {}",
            sps.kind.as_u8(),
            pps.kind.as_u8()
        )));
    }
    if sps.size < MIN_SPS_SIZE || pps.size < MIN_PPS_SIZE {
        return Err(ParseError::malformed(format!(
            "unexpected H.264 header: sps {} bytes, pps {} bytes",
            sps.size, pps.size
        )));
    }

    let sps_data = sps
        .data(buffer)
        .ok_or_else(|| ParseError::malformed("SPS outside of buffer"))?;
    let pps_data = pps
        .data(buffer)
        .ok_or_else(|| ParseError::malformed("PPS outside of buffer"))?;

    let record = ConfigurationRecord::from_parameter_sets(sps_data, pps_data)?;
    tracing::trace!("codec data: {:02x?}", record.as_bytes());
    Ok(record)
}
