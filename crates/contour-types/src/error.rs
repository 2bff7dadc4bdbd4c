use thiserror::Error;

/// Errors produced while parsing or rewriting content addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("content address has no protocol delimiter: {0}")]
    MissingDelimiter(String),

    #[error("content address has an empty protocol: {0}")]
    EmptyProtocol(String),

    #[error("content address protocol must not contain the delimiter: {0}")]
    InvalidProtocol(String),

    #[error("content address has an empty identifier: {0}")]
    EmptyIdentifier(String),

    #[error("prefix descriptor in {address} announces {expected} segments that are not present")]
    MalformedPrefixes { address: String, expected: usize },

    #[error("invalid routing prefix segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },
}
