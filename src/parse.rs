//! Byte-stream to AVC parser element.
//!
//! [`H264Parse`] owns the per-stream state and runs, for every access unit:
//!
//! 1. configuration extraction, until a record has been published for the
//!    current output format;
//! 2. the in-place rewrite to length-prefixed NAL units.

use anyhow::Context;
use h264parse_bitstream::{rewrite_in_place, ParseError, Rewritten, StreamState, NAL_LENGTH_SIZE};

use crate::buffer::AccessUnit;
use crate::format::{transform_formats, PadDirection, VideoFormat};
use crate::sink::ConfigurationSink;

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    /// Buffers carry a single NAL unit of data.
    pub single_nalu: bool,
}

/// Builder for [`H264Parse`].
#[derive(Debug, Default)]
pub struct H264ParseBuilder {
    settings: Settings,
}

impl H264ParseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one NAL unit per buffer.
    pub fn single_nalu(mut self, single_nalu: bool) -> Self {
        self.settings.single_nalu = single_nalu;
        self
    }

    pub fn build(self) -> H264Parse {
        H264Parse::with_settings(self.settings)
    }
}

/// H.264 byte-stream to AVC transform.
#[derive(Debug)]
pub struct H264Parse {
    settings: Settings,
    state: StreamState,
    input_format: Option<VideoFormat>,
    output_format: Option<VideoFormat>,
    published: Option<VideoFormat>,
}

impl Default for H264Parse {
    fn default() -> Self {
        Self::with_settings(Settings::default())
    }
}

impl H264Parse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> H264ParseBuilder {
        H264ParseBuilder::new()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            state: StreamState::new(settings.single_nalu),
            input_format: None,
            output_format: None,
            published: None,
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn single_nalu(&self) -> bool {
        self.settings.single_nalu
    }

    pub fn set_single_nalu(&mut self, single_nalu: bool) {
        self.settings.single_nalu = single_nalu;
        self.state.single_nalu_mode = single_nalu;
    }

    /// Current stream state.
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Negotiated input format.
    pub fn input_format(&self) -> Option<&VideoFormat> {
        self.input_format.as_ref()
    }

    /// Negotiated output format.
    pub fn output_format(&self) -> Option<&VideoFormat> {
        self.output_format.as_ref()
    }

    /// Last output format published with a configuration record.
    pub fn published_format(&self) -> Option<&VideoFormat> {
        self.published.as_ref()
    }

    /// Begin a new stream.
    pub fn start(&mut self) {
        tracing::debug!("starting stream");
        self.state = StreamState::new(self.settings.single_nalu);
    }

    /// End the stream, dropping its state and negotiated formats.
    pub fn stop(&mut self) {
        tracing::debug!("stopping stream");
        self.published = None;
        self.input_format = None;
        self.output_format = None;
        self.state.reset();
    }

    /// Formats this parser can produce (or accept) for the given peer formats.
    pub fn transform_formats(
        &self,
        direction: PadDirection,
        formats: &[VideoFormat],
        filter: Option<&[VideoFormat]>,
    ) -> Vec<VideoFormat> {
        let result = transform_formats(direction, formats, filter);
        tracing::info!(
            "transformed {} format(s) on {:?} side into [{}]",
            formats.len(),
            direction,
            result
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
        result
    }

    /// Record the negotiated formats.
    ///
    /// A different output format invalidates the published configuration, so
    /// the next buffer extracts it again.
    pub fn set_formats(&mut self, input: VideoFormat, output: VideoFormat) {
        tracing::info!("setting input format: {} output format: {}", input, output);

        if let Some(published) = &self.published {
            if published.without_codec_data() != output.without_codec_data() {
                tracing::debug!("output format changed, codec data should be updated");
                self.state.invalidate_configuration();
            }
        }

        self.input_format = Some(input);
        self.output_format = Some(output);
    }

    /// Convert one access unit in place.
    ///
    /// Failing to extract a configuration record is logged and retried on the
    /// next buffer. Failing to map or rewrite the buffer is returned: the
    /// buffer must not be forwarded.
    pub fn process<S: ConfigurationSink + ?Sized>(
        &mut self,
        au: &mut AccessUnit,
        sink: &mut S,
    ) -> Result<Rewritten, ParseError> {
        if !self.state.configuration_set {
            if let Err(e) = self.publish_configuration(au, sink) {
                tracing::warn!("Failed to get codec data: {:#}", e);
            }
        }

        self.to_packetized(au)
    }

    fn publish_configuration<S: ConfigurationSink + ?Sized>(
        &mut self,
        au: &AccessUnit,
        sink: &mut S,
    ) -> anyhow::Result<()> {
        tracing::debug!("generating codec data..");
        let data = au.map_readable()?;
        let update = self.state.extract_configuration(data)?;

        let format = self
            .output_format
            .as_ref()
            .map(VideoFormat::without_codec_data)
            .unwrap_or_else(VideoFormat::avc)
            .with_codec_data(update.record.clone());

        sink.publish(&format, update.changed)
            .context("src format can't be updated")?;

        tracing::info!("updated format with codec data ({})", format);
        self.state.commit_configuration(update.record);
        self.published = Some(format);
        Ok(())
    }

    fn to_packetized(&mut self, au: &mut AccessUnit) -> Result<Rewritten, ParseError> {
        let data = au.map_writable().inspect_err(|e| {
            tracing::error!("failed to map buffer: {}", e);
        })?;

        if data.len() <= NAL_LENGTH_SIZE {
            let layout = ParseError::UnsupportedLayout { len: data.len() };
            tracing::debug!("{}, passing buffer through", layout);
            return Ok(Rewritten::default());
        }

        let result = rewrite_in_place(data, &self.state)?;

        if let Some(key_unit) = result.key_unit {
            au.set_delta_unit(!key_unit);
        }
        au.trim_front(result.start)?;

        Ok(result)
    }
}
