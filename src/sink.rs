//! Receivers for published output formats.

use anyhow::Result;

use crate::format::VideoFormat;

/// Receives the output format each time a configuration record is extracted.
///
/// `changed` is false when the record is identical to the one published
/// before, e.g. after a format renegotiation that did not alter SPS/PPS.
/// Returning an error leaves the configuration unpublished; the parser retries
/// on the next buffer.
pub trait ConfigurationSink {
    fn publish(&mut self, format: &VideoFormat, changed: bool) -> Result<()>;
}

impl<F> ConfigurationSink for F
where
    F: FnMut(&VideoFormat, bool) -> Result<()>,
{
    fn publish(&mut self, format: &VideoFormat, changed: bool) -> Result<()> {
        self(format, changed)
    }
}

/// Keeps the most recently published format.
#[derive(Debug, Default)]
pub struct LatestFormat {
    format: Option<VideoFormat>,
    publications: usize,
    changes: usize,
}

impl LatestFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last published format.
    pub fn format(&self) -> Option<&VideoFormat> {
        self.format.as_ref()
    }

    /// How many times a format was published.
    pub fn publications(&self) -> usize {
        self.publications
    }

    /// How many publications carried a changed record.
    pub fn changes(&self) -> usize {
        self.changes
    }
}

impl ConfigurationSink for LatestFormat {
    fn publish(&mut self, format: &VideoFormat, changed: bool) -> Result<()> {
        self.format = Some(format.clone());
        self.publications += 1;
        if changed {
            self.changes += 1;
        }
        Ok(())
    }
}
