//! Per-stream state carried across access units.

use crate::error::ParseError;
use crate::nal::locate_header;
use crate::record::{build_configuration, ConfigurationRecord};

/// State of one byte-stream to AVC conversion.
///
/// Each stream owns its own value; nothing here is shared between streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Offset of the first slice start code in the last header-bearing buffer.
    pub header_size: usize,
    /// Whether a configuration record has been published for the current format.
    pub configuration_set: bool,
    /// Emit one NAL unit per buffer.
    pub single_nalu_mode: bool,
    /// The record last published for this stream.
    pub current_configuration: Option<ConfigurationRecord>,
}

/// Result of a successful header extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationUpdate {
    /// The freshly built record.
    pub record: ConfigurationRecord,
    /// False when the record equals the one last published.
    pub changed: bool,
}

impl StreamState {
    /// Create a fresh state for a new stream.
    #[must_use]
    pub fn new(single_nalu_mode: bool) -> Self {
        Self {
            single_nalu_mode,
            ..Default::default()
        }
    }

    /// Forget the published configuration so the next buffer re-extracts it.
    pub fn invalidate_configuration(&mut self) {
        self.configuration_set = false;
    }

    /// Reset everything except the mode, as when the stream stops.
    pub fn reset(&mut self) {
        *self = Self::new(self.single_nalu_mode);
    }

    /// Locate SPS/PPS in `buffer` and build a configuration record.
    ///
    /// `header_size` is refreshed from `buffer` even when extraction fails.
    /// The state only keeps the new record once the caller has published it
    /// through [`StreamState::commit_configuration`].
    pub fn extract_configuration(
        &mut self,
        buffer: &[u8],
    ) -> Result<ConfigurationUpdate, ParseError> {
        tracing::trace!("fetching header SPS and PPS");
        let location = locate_header(buffer);
        self.header_size = location.header_size;

        let (sps, pps) = match (location.sps, location.pps) {
            (Some(sps), Some(pps)) => (sps, pps),
            (None, _) => return Err(ParseError::malformed("no SPS before the first slice")),
            (_, None) => return Err(ParseError::malformed("no PPS before the first slice")),
        };

        let record = build_configuration(buffer, &sps, &pps)?;
        let changed = self.current_configuration.as_ref() != Some(&record);

        Ok(ConfigurationUpdate { record, changed })
    }

    /// Mark `record` as published for the current format.
    pub fn commit_configuration(&mut self, record: ConfigurationRecord) {
        self.current_configuration = Some(record);
        self.configuration_set = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_unit(sps: &[u8], pps: Option<&[u8]>) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        data.extend_from_slice(sps);
        if let Some(pps) = pps {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            data.extend_from_slice(pps);
        }
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00, 0x21]);
        data
    }

    #[test]
    fn test_extract_configuration() {
        let sps = [0x67, 0x42, 0xc0, 0x1e, 0xda, 0x02];
        let pps = [0x68, 0xce, 0x3c, 0x80];
        let data = access_unit(&sps, Some(&pps));
        let mut state = StreamState::new(false);

        let update = state.extract_configuration(&data).unwrap();
        assert!(update.changed);
        assert_eq!(update.record.sps(), &sps);
        assert_eq!(state.header_size, 4 + sps.len() + 4 + pps.len());
        // Publishing is the caller's decision.
        assert!(!state.configuration_set);
        assert!(state.current_configuration.is_none());

        state.commit_configuration(update.record.clone());
        assert!(state.configuration_set);
        assert_eq!(state.current_configuration, Some(update.record));

        let again = state.extract_configuration(&data).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_unpublished_record_still_reported_changed() {
        let data = access_unit(&[0x67, 0x42, 0xc0, 0x1e], Some(&[0x68, 0xce, 0x3c, 0x80]));
        let mut state = StreamState::new(false);

        // First extraction never made it to a consumer.
        assert!(state.extract_configuration(&data).unwrap().changed);

        let retry = state.extract_configuration(&data).unwrap();
        assert!(retry.changed);
    }

    #[test]
    fn test_extract_configuration_detects_change() {
        let pps = [0x68, 0xce, 0x3c, 0x80];
        let mut state = StreamState::new(false);

        let first = state
            .extract_configuration(&access_unit(&[0x67, 0x42, 0xc0, 0x1e], Some(&pps)))
            .unwrap();
        state.commit_configuration(first.record);
        let update = state
            .extract_configuration(&access_unit(&[0x67, 0x64, 0x00, 0x28], Some(&pps)))
            .unwrap();

        assert!(update.changed);
        assert_eq!(update.record.profile(), 0x64);
    }

    #[test]
    fn test_extract_configuration_missing_pps() {
        let data = access_unit(&[0x67, 0x42, 0xc0, 0x1e, 0xda], None);
        let mut state = StreamState::new(false);

        let err = state.extract_configuration(&data).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader(_)));
        assert!(err.is_recoverable());
        assert!(state.current_configuration.is_none());
        assert_eq!(state.header_size, 9);
    }

    #[test]
    fn test_reset_keeps_mode() {
        let mut state = StreamState::new(true);
        state.header_size = 42;
        state.configuration_set = true;

        state.invalidate_configuration();
        assert!(!state.configuration_set);

        state.reset();
        assert_eq!(state, StreamState::new(true));
    }
}
