use bytes::Bytes;
use futures_core::Stream;
use std::ops::{Range, RangeInclusive};
use std::pin::Pin;
use std::time::Duration;

use crate::{KodoError, KodoResult};

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Byte range for partial reads, always inclusive on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>, // inclusive; None means "to end of object"
}

impl ByteRange {
    /// Range covering `start..=end`
    pub fn inclusive(start: u64, end: u64) -> KodoResult<Self> {
        if end < start {
            return Err(KodoError::invalid(format!("invalid range {}..={}", start, end)));
        }
        Ok(Self { start, end: Some(end) })
    }

    /// Range covering `start..end`
    pub fn exclusive(start: u64, end: u64) -> KodoResult<Self> {
        if end <= start {
            return Err(KodoError::invalid(format!("empty range {}..{}", start, end)));
        }
        Ok(Self {
            start,
            end: Some(end - 1),
        })
    }

    pub fn from_start(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Value for the `Range` request header
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }

    /// Number of bytes covered, if bounded
    pub fn content_length(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }
}

impl TryFrom<Range<u64>> for ByteRange {
    type Error = KodoError;

    fn try_from(range: Range<u64>) -> Result<Self, Self::Error> {
        Self::exclusive(range.start, range.end)
    }
}

impl TryFrom<RangeInclusive<u64>> for ByteRange {
    type Error = KodoError;

    fn try_from(range: RangeInclusive<u64>) -> Result<Self, Self::Error> {
        Self::inclusive(*range.start(), *range.end())
    }
}

/// How a browser should treat a downloaded object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl std::str::FromStr for Disposition {
    type Err = KodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(Disposition::Inline),
            "attachment" => Ok(Disposition::Attachment),
            other => Err(KodoError::invalid(format!("Unknown disposition: {}", other))),
        }
    }
}

/// Options for building a download URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub disposition: Option<Disposition>,

    /// Download name for attachments (defaults to the key)
    pub filename: Option<String>,

    /// `Content-Type` override for inline responses
    pub content_type: Option<String>,

    /// Store-side processing directive, e.g. `imageInfo`
    pub fop: Option<String>,

    /// Signed URL lifetime, private buckets only
    pub expires_in: Option<Duration>,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachment() -> Self {
        Self::new().with_disposition(Disposition::Attachment)
    }

    pub fn inline() -> Self {
        Self::new().with_disposition(Disposition::Inline)
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_fop<S: Into<String>>(mut self, fop: S) -> Self {
        self.fop = Some(fop.into());
        self
    }

    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }
}
