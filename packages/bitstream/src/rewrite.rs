//! In-place conversion of an Annex B access unit to AVC (length-prefixed) form.
//!
//! Every start code is overwritten with the big-endian length of the NAL unit
//! that follows it. Leading parameter sets are not copied out; instead the
//! caller is told how many bytes to drop from the front of the buffer.

use crate::error::ParseError;
use crate::nal::{locate_header, scan, NalUnit, NalUnitType, NAL_LENGTH_SIZE};
use crate::state::StreamState;

/// Outcome of [`rewrite_in_place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rewritten {
    /// Number of leading bytes the caller must drop from the buffer.
    pub start: usize,
    /// `Some(true)` for a key unit, `Some(false)` for a delta unit, `None` to
    /// leave the caller's flag untouched.
    pub key_unit: Option<bool>,
    /// Number of length-prefixed NAL units left after `start`.
    pub nal_count: usize,
}

impl Rewritten {
    /// Returns true if the buffer was left exactly as it was.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.start == 0 && self.key_unit.is_none() && self.nal_count == 0
    }
}

/// Rewrite `buffer` from Annex B to AVC form.
///
/// The buffer must be one contiguous block owned exclusively by the caller for
/// the duration of the call. A buffer without start codes is left untouched.
pub fn rewrite_in_place(
    buffer: &mut [u8],
    state: &StreamState,
) -> Result<Rewritten, ParseError> {
    tracing::debug!("parsing byte-stream to avc ({} bytes)", buffer.len());

    if state.single_nalu_mode {
        rewrite_single_nalu(buffer, state.header_size)
    } else {
        rewrite_all(buffer)
    }
}

fn rewrite_all(buffer: &mut [u8]) -> Result<Rewritten, ParseError> {
    let nals: Vec<NalUnit> = scan(buffer).collect();

    // A parameter set followed by another NAL is discarded together with
    // everything before it. The last NAL of the buffer is always kept.
    let first_kept = nals
        .iter()
        .enumerate()
        .rev()
        .skip(1)
        .find(|(_, nal)| nal.kind.is_parameter_set())
        .map(|(i, _)| i + 1);

    let mut result = Rewritten::default();
    if let Some(index) = first_kept {
        tracing::debug!("SPS and PPS discard");
        let nal = &nals[index];
        result.start = nal.start_code_offset().ok_or(ParseError::OutOfBounds {
            offset: nal.offset,
            len: buffer.len(),
        })?;
        result.key_unit = Some(true);
    }

    for nal in &nals[first_kept.unwrap_or(0)..] {
        tracing::debug!("NAL unit {} ({} bytes)", nal.kind.as_u8(), nal.size);
        write_length(buffer, nal)?;
        result.nal_count += 1;
    }

    Ok(result)
}

fn rewrite_single_nalu(
    buffer: &mut [u8],
    last_header_size: usize,
) -> Result<Rewritten, ParseError> {
    let Some(first) = scan(buffer).next() else {
        return Ok(Rewritten::default());
    };
    let len = buffer.len();

    if !first.kind.is_parameter_set() {
        tracing::debug!("single NALU, found a P-frame");
        let nal = NalUnit {
            size: len - first.offset,
            ..first
        };
        write_length(buffer, &nal)?;
        return Ok(Rewritten {
            start: 0,
            key_unit: Some(false),
            nal_count: 1,
        });
    }

    tracing::debug!("single NALU, found an I-frame");
    // Header sizes vary between key units; only this buffer's layout counts.
    let header_size = locate_header(buffer).header_size;
    if header_size != last_header_size {
        tracing::debug!("header size {} -> {}", last_header_size, header_size);
    }

    if header_size >= len {
        // Parameter sets only; nothing left to emit.
        return Ok(Rewritten {
            start: len,
            key_unit: Some(true),
            nal_count: 0,
        });
    }

    let offset = header_size
        .checked_add(NAL_LENGTH_SIZE)
        .filter(|offset| *offset <= len)
        .ok_or(ParseError::OutOfBounds {
            offset: header_size,
            len,
        })?;
    let slice = NalUnit {
        kind: buffer
            .get(offset)
            .map_or(NalUnitType::Unknown, |byte| NalUnitType::from_header(*byte)),
        offset,
        size: len - offset,
    };
    write_length(buffer, &slice)?;

    Ok(Rewritten {
        start: header_size,
        key_unit: Some(true),
        nal_count: 1,
    })
}

/// Overwrite the start code in front of `nal` with its big-endian length.
fn write_length(buffer: &mut [u8], nal: &NalUnit) -> Result<(), ParseError> {
    let len = buffer.len();
    let out_of_bounds = ParseError::OutOfBounds {
        offset: nal.offset,
        len,
    };

    let prefix_start = nal
        .offset
        .checked_sub(NAL_LENGTH_SIZE)
        .ok_or_else(|| out_of_bounds.clone())?;
    let length = u32::try_from(nal.size).map_err(|_| out_of_bounds.clone())?;
    let prefix = buffer
        .get_mut(prefix_start..nal.offset)
        .ok_or(out_of_bounds)?;

    prefix.copy_from_slice(&length.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SC: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
    const SPS: [u8; 10] = [0x67, 0x64, 0x00, 0x0a, 0xac, 0xd9, 0x40, 0x50, 0x05, 0xbb];
    const PPS: [u8; 4] = [0x68, 0xee, 0x3c, 0x80];
    const IDR: [u8; 6] = [0x65, 0x88, 0x84, 0x00, 0x33, 0xff];
    const P_SLICE: [u8; 5] = [0x41, 0x9a, 0x02, 0x04, 0x08];

    fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for nal in nals {
            data.extend_from_slice(&SC);
            data.extend_from_slice(nal);
        }
        data
    }

    fn avc(nals: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for nal in nals {
            data.extend_from_slice(&(nal.len() as u32).to_be_bytes());
            data.extend_from_slice(nal);
        }
        data
    }

    fn multi() -> StreamState {
        StreamState::new(false)
    }

    #[test]
    fn test_no_start_code_is_noop() {
        let mut rng = StdRng::seed_from_u64(0x264);
        for _ in 0..64 {
            let len = rng.random_range(0..256);
            // Non-zero bytes can never form a start code.
            let input: Vec<u8> = (0..len).map(|_| rng.random_range(1..=255)).collect();
            let mut buffer = input.clone();

            let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
            assert!(result.is_passthrough());
            assert_eq!(buffer, input);

            let result = rewrite_in_place(&mut buffer, &StreamState::new(true)).unwrap();
            assert!(result.is_passthrough());
            assert_eq!(buffer, input);
        }
    }

    #[test]
    fn test_header_and_idr() {
        let mut buffer = annex_b(&[&SPS, &PPS, &IDR]);

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.start, 4 + SPS.len() + 4 + PPS.len());
        assert_eq!(result.key_unit, Some(true));
        assert_eq!(result.nal_count, 1);

        let output = &buffer[result.start..];
        assert_eq!(&output[..7], &[0x00, 0x00, 0x00, 0x06, 0x65, 0x88, 0x84]);
        assert_eq!(output, &avc(&[&IDR])[..]);
    }

    #[test]
    fn test_single_slice() {
        let mut buffer = annex_b(&[&P_SLICE]);
        let len = buffer.len();

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.start, 0);
        assert_eq!(result.key_unit, None);
        assert_eq!(result.nal_count, 1);
        assert_eq!(&buffer[..4], &((len - 4) as u32).to_be_bytes());
        assert_eq!(&buffer[4..], &P_SLICE);
    }

    #[test]
    fn test_multiple_slices() {
        let second: [u8; 7] = [0x41, 0x9a, 0x10, 0x20, 0x30, 0x40, 0x50];
        let mut buffer = annex_b(&[&P_SLICE, &second]);

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.nal_count, 2);
        assert_eq!(buffer, avc(&[&P_SLICE, &second]));
    }

    #[test]
    fn test_nal_count_excludes_leading_parameter_sets() {
        let sei: [u8; 5] = [0x06, 0x05, 0x01, 0xaa, 0x80];
        let input = annex_b(&[&SPS, &PPS, &sei, &IDR, &P_SLICE]);
        let start_codes = scan(&input).count();
        let mut buffer = input.clone();

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.nal_count, start_codes - 2);
        assert_eq!(&buffer[result.start..], &avc(&[&sei, &IDR, &P_SLICE])[..]);
    }

    #[test]
    fn test_parameter_sets_only_keep_last() {
        let mut buffer = annex_b(&[&SPS, &PPS]);

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.start, 4 + SPS.len());
        assert_eq!(result.key_unit, Some(true));
        assert_eq!(&buffer[result.start..], &avc(&[&PPS])[..]);
    }

    #[test]
    fn test_missing_pps_still_rewrites() {
        let mut buffer = annex_b(&[&SPS, &IDR]);

        let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
        assert_eq!(result.start, 4 + SPS.len());
        assert_eq!(&buffer[result.start..], &avc(&[&IDR])[..]);
    }

    #[test]
    fn test_short_buffer_is_noop() {
        for input in [vec![], vec![0x00], SC.to_vec(), vec![0x00, 0x00, 0x00, 0x01, 0x65]] {
            let mut buffer = input.clone();
            let result = rewrite_in_place(&mut buffer, &multi()).unwrap();
            assert!(result.is_passthrough());
            assert_eq!(buffer, input);
        }
    }

    #[test]
    fn test_single_nalu_key_unit() {
        let input = annex_b(&[&SPS, &PPS, &IDR]);
        let mut state = StreamState::new(true);
        state.extract_configuration(&input).unwrap();
        let mut buffer = input.clone();

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.start, state.header_size);
        assert_eq!(result.key_unit, Some(true));
        assert_eq!(result.nal_count, 1);
        assert_eq!(&buffer[result.start..], &avc(&[&IDR])[..]);
    }

    #[test]
    fn test_single_nalu_delta_unit() {
        let mut state = StreamState::new(true);
        state.header_size = 22;
        let mut buffer = annex_b(&[&P_SLICE]);

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.start, 0);
        assert_eq!(result.key_unit, Some(false));
        // The length covers everything from the NAL header to the end.
        assert_eq!(&buffer[..4], &(P_SLICE.len() as u32).to_be_bytes());
        assert_eq!(&buffer[4..], &P_SLICE);
    }

    #[test]
    fn test_single_nalu_keeps_trailing_nals_in_one_unit() {
        let state = StreamState::new(true);
        let mut buffer = annex_b(&[&P_SLICE, &P_SLICE]);
        let len = buffer.len();

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.nal_count, 1);
        assert_eq!(&buffer[..4], &((len - 4) as u32).to_be_bytes());
        // The second start code is payload of the single unit.
        assert_eq!(&buffer[9..13], &SC);
    }

    #[test]
    fn test_single_nalu_relocates_stale_header() {
        // header_size left over from a buffer with a longer SPS.
        let mut state = StreamState::new(true);
        state.header_size = 40;
        let short_sps = [0x67, 0x42, 0xc0, 0x1e];
        let mut buffer = annex_b(&[&short_sps, &PPS, &IDR]);

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.start, 4 + short_sps.len() + 4 + PPS.len());
        assert_eq!(&buffer[result.start..], &avc(&[&IDR])[..]);
    }

    #[test]
    fn test_single_nalu_shorter_header_keeps_first_slice() {
        // A longer header earlier in the stream left header_size at 22, which
        // lands on the second slice of this key unit.
        let mut state = StreamState::new(true);
        state.header_size = 22;
        let sps = [0x67, 0x42, 0xc0, 0x1e];
        let pps = [0x68, 0xce];
        let idr_a = [0x65, 0x88, 0x84, 0x21];
        let idr_b = [0x65, 0x40, 0x11, 0x22, 0x33];
        let mut buffer = annex_b(&[&sps, &pps, &idr_a, &idr_b]);
        let len = buffer.len();
        assert_eq!(&buffer[22..26], &SC);

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.start, 14);
        assert_eq!(result.key_unit, Some(true));
        assert_eq!(&buffer[14..18], &((len - 18) as u32).to_be_bytes());
        assert_eq!(&buffer[18..22], &idr_a);
    }

    #[test]
    fn test_single_nalu_header_without_slice() {
        let state = StreamState::new(true);
        let mut buffer = annex_b(&[&SPS, &PPS]);
        let len = buffer.len();

        let result = rewrite_in_place(&mut buffer, &state).unwrap();
        assert_eq!(result.start, len);
        assert_eq!(result.key_unit, Some(true));
        assert_eq!(result.nal_count, 0);
    }

    #[test]
    fn test_write_length_rejects_bad_offset() {
        let mut buffer = vec![0u8; 8];
        let nal = NalUnit {
            kind: NalUnitType::Slice,
            offset: 2,
            size: 6,
        };
        let err = write_length(&mut buffer, &nal).unwrap_err();
        assert_eq!(err, ParseError::OutOfBounds { offset: 2, len: 8 });

        let nal = NalUnit {
            kind: NalUnitType::Slice,
            offset: 12,
            size: 0,
        };
        assert!(write_length(&mut buffer, &nal).is_err());
    }
}
