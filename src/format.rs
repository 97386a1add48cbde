//! Stream format descriptions and format transformation.
//!
//! The parser accepts `video/x-h264, stream-format=byte-stream` and produces
//! `video/x-h264, stream-format=avc`. The avc side carries the configuration
//! record out of band as `codec_data`.

use std::fmt;
use std::str::FromStr;

use h264parse_bitstream::ConfigurationRecord;

/// How NAL units are delimited in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    /// Annex B start codes.
    ByteStream,
    /// 4-byte big-endian length prefixes.
    Avc,
}

impl StreamFormat {
    /// Format name as used in format strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByteStream => "byte-stream",
            Self::Avc => "avc",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "byte-stream" => Ok(Self::ByteStream),
            "avc" => Ok(Self::Avc),
            other => anyhow::bail!("unknown stream-format '{}'", other),
        }
    }
}

/// Which side of the parser a format belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Input (byte-stream) side.
    Sink,
    /// Output (avc) side.
    Src,
}

/// An H.264 video format.
///
/// `None` dimensions accept any size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    /// NAL delimiting scheme.
    pub stream_format: StreamFormat,
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// avcC record, only meaningful for [`StreamFormat::Avc`].
    pub codec_data: Option<ConfigurationRecord>,
}

impl VideoFormat {
    /// Any-size byte-stream format.
    pub fn byte_stream() -> Self {
        Self {
            stream_format: StreamFormat::ByteStream,
            width: None,
            height: None,
            codec_data: None,
        }
    }

    /// Any-size avc format.
    pub fn avc() -> Self {
        Self {
            stream_format: StreamFormat::Avc,
            ..Self::byte_stream()
        }
    }

    /// Set fixed dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Attach a configuration record.
    #[must_use]
    pub fn with_codec_data(mut self, record: ConfigurationRecord) -> Self {
        self.codec_data = Some(record);
        self
    }

    /// Copy of this format without `codec_data`.
    #[must_use]
    pub fn without_codec_data(&self) -> Self {
        Self {
            codec_data: None,
            ..self.clone()
        }
    }

    /// Returns true if every value this format allows is also allowed by `other`.
    pub fn is_subset_of(&self, other: &VideoFormat) -> bool {
        fn field_subset<T: PartialEq>(mine: &Option<T>, theirs: &Option<T>) -> bool {
            match (mine, theirs) {
                (_, None) => true,
                (Some(a), Some(b)) => a == b,
                (None, Some(_)) => false,
            }
        }

        self.stream_format == other.stream_format
            && field_subset(&self.width, &other.width)
            && field_subset(&self.height, &other.height)
            && field_subset(&self.codec_data, &other.codec_data)
    }

    /// The format allowed by both `self` and `other`, if any.
    pub fn intersect(&self, other: &VideoFormat) -> Option<VideoFormat> {
        fn field_intersect<T: PartialEq + Clone>(
            a: &Option<T>,
            b: &Option<T>,
        ) -> Result<Option<T>, ()> {
            match (a, b) {
                (Some(x), Some(y)) if x != y => Err(()),
                (Some(x), _) => Ok(Some(x.clone())),
                (None, y) => Ok(y.clone()),
            }
        }

        if self.stream_format != other.stream_format {
            return None;
        }
        Some(VideoFormat {
            stream_format: self.stream_format,
            width: field_intersect(&self.width, &other.width).ok()?,
            height: field_intersect(&self.height, &other.height).ok()?,
            codec_data: field_intersect(&self.codec_data, &other.codec_data).ok()?,
        })
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video/x-h264, stream-format=(string){}", self.stream_format)?;
        if let Some(width) = self.width {
            write!(f, ", width=(int){}", width)?;
        }
        if let Some(height) = self.height {
            write!(f, ", height=(int){}", height)?;
        }
        if let Some(record) = &self.codec_data {
            f.write_str(", codec_data=(buffer)")?;
            for byte in record.as_bytes() {
                write!(f, "{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// Map formats from one side of the parser to the other.
///
/// Formats on the sink side become avc, formats on the src side become
/// byte-stream. Entries already expressed by an earlier result are skipped.
/// With a `filter`, the result follows the filter's order and only keeps what
/// both allow.
pub fn transform_formats(
    direction: PadDirection,
    formats: &[VideoFormat],
    filter: Option<&[VideoFormat]>,
) -> Vec<VideoFormat> {
    let target = match direction {
        PadDirection::Sink => StreamFormat::Avc,
        PadDirection::Src => StreamFormat::ByteStream,
    };

    let mut result: Vec<VideoFormat> = Vec::with_capacity(formats.len());
    for format in formats {
        let transformed = VideoFormat {
            stream_format: target,
            codec_data: None,
            ..format.clone()
        };
        if result.iter().any(|existing| transformed.is_subset_of(existing)) {
            continue;
        }
        result.push(transformed);
    }

    let Some(filter) = filter else {
        return result;
    };

    let mut intersected = Vec::new();
    for wanted in filter {
        for candidate in &result {
            if let Some(format) = wanted.intersect(candidate) {
                if !intersected.contains(&format) {
                    intersected.push(format);
                }
            }
        }
    }
    intersected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConfigurationRecord {
        ConfigurationRecord::from_parameter_sets(&[0x67, 0x42, 0xc0, 0x1e], &[0x68, 0xce]).unwrap()
    }

    #[test]
    fn test_stream_format_strings() {
        assert_eq!(StreamFormat::ByteStream.to_string(), "byte-stream");
        assert_eq!("avc".parse::<StreamFormat>().unwrap(), StreamFormat::Avc);
        assert!("hvc1".parse::<StreamFormat>().is_err());
    }

    #[test]
    fn test_display() {
        let format = VideoFormat::avc()
            .with_size(640, 480)
            .with_codec_data(record());
        assert_eq!(
            format.to_string(),
            "video/x-h264, stream-format=(string)avc, width=(int)640, height=(int)480, \
             codec_data=(buffer)0142c01effe100046742c01e01000268ce"
        );
    }

    #[test]
    fn test_transform_sink_to_src() {
        let input = [VideoFormat::byte_stream().with_size(1280, 720)];
        let output = transform_formats(PadDirection::Sink, &input, None);
        assert_eq!(output, vec![VideoFormat::avc().with_size(1280, 720)]);
    }

    #[test]
    fn test_transform_src_to_sink_drops_codec_data() {
        let input = [VideoFormat::avc().with_codec_data(record())];
        let output = transform_formats(PadDirection::Src, &input, None);
        assert_eq!(output, vec![VideoFormat::byte_stream()]);
    }

    #[test]
    fn test_transform_skips_redundant_entries() {
        let input = [
            VideoFormat::byte_stream(),
            VideoFormat::byte_stream().with_size(640, 480),
        ];
        let output = transform_formats(PadDirection::Sink, &input, None);
        assert_eq!(output, vec![VideoFormat::avc()]);
    }

    #[test]
    fn test_transform_with_filter() {
        let input = [VideoFormat::byte_stream()];
        let filter = [
            VideoFormat::byte_stream(),
            VideoFormat::avc().with_size(320, 240),
        ];
        let output = transform_formats(PadDirection::Sink, &input, Some(&filter));
        assert_eq!(output, vec![VideoFormat::avc().with_size(320, 240)]);
    }

    #[test]
    fn test_intersect_conflict() {
        let a = VideoFormat::avc().with_size(640, 480);
        let b = VideoFormat::avc().with_size(1280, 720);
        assert!(a.intersect(&b).is_none());
        assert!(a.is_subset_of(&VideoFormat::avc()));
        assert!(!VideoFormat::avc().is_subset_of(&a));
    }
}
