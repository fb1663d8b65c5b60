//! The error type shared by every fallible operation of this crate.

use thiserror::Error;

/// A boxed error from a [`crate::transport::Transport`] implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A [`Result`](std::result::Result) alias with [`BooruError`] as the error type.
pub type Result<T, E = BooruError> = std::result::Result<T, E>;

/// Everything that can go wrong while talking to a booru.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BooruError {
    /// The HTTP GET itself failed, or the server answered with an error status.
    #[error("Failed to GET {url}: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The transport error.
        #[source]
        source: BoxError,
    },
    /// The response body is not the XML document we expected.
    #[error("Malformed XML response: {0}")]
    Parse(String),
    /// The API returned nothing where at least one element was expected.
    #[error("Empty result for {0}")]
    EmptyResult(String),
    /// The resolved local offset is past the end of the fetched page,
    /// which usually means the global offset is past the end of the results.
    #[error("Offset [{offset}] > returned posts length [{len}]")]
    OutOfRange {
        /// The resolved local offset.
        offset: u64,
        /// The number of posts the page actually holds.
        len: usize,
    },
    /// The image URL has an extension we can not decode.
    #[error("Unsupported image format \"{0}\"")]
    UnsupportedFormat(String),
    /// The API was used in a way that can never succeed,
    /// e.g. offset lookups before the post cap is known.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
    /// Post cap discovery failed because the sentinel page could not be fetched.
    #[error("Failed to discover the post cap of {name}: {source}")]
    DiscoveryFailed {
        /// The derived name of the booru.
        name: String,
        /// Why the sentinel page could not be fetched.
        #[source]
        source: Box<BooruError>,
    },
    /// The image URL is too short to be a URL at all.
    #[error("Image URL {0:?} is too short")]
    UrlTooShort(String),
    /// The URL could not be parsed.
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// The parser's complaint.
        reason: String,
    },
    /// The downloaded bytes could not be decoded as the expected format.
    #[error(transparent)]
    Decode(#[from] image::ImageError),
    /// The downloaded booru file does not match the MD5 the booru reported.
    #[error("MD5 mismatch, expected {expected} but got {actual}")]
    ChecksumMismatch {
        /// The MD5 reported by the booru.
        expected: String,
        /// The MD5 of the downloaded bytes.
        actual: String,
    },
    /// Both the booru copy and the source copy of an image failed to load.
    #[error("{primary}\n{fallback}")]
    ImageLoad {
        /// Why the booru copy failed.
        primary: Box<BooruError>,
        /// Why the source copy failed.
        fallback: Box<BooruError>,
    },
}

impl BooruError {
    /// Wrap a transport failure for `url`.
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }
}

impl From<roxmltree::Error> for BooruError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
