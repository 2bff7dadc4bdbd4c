//! Validation of routing prefix segments and configured route values.
//!
//! A prefix segment is embedded verbatim in a content address identifier,
//! so it must survive `/`-splitting:
//! - Must be non-empty
//! - Must not contain `/`, whitespace or control characters
//! - Must not contain the protocol delimiter
//!
//! Route values (the keys of a policy mapping such as a site name or a
//! selector value) additionally must not start with `_`, which is reserved
//! for the `_default` / `_fallback` routes.

use crate::address::PROTOCOL_DELIMITER;
use crate::error::AddressError;

/// Leading character reserved for built-in route values.
pub const RESERVED_ROUTE_MARKER: char = '_';

/// Validate a single routing prefix segment.
///
/// # Examples
///
/// ```
/// use contour_types::names::validate_prefix_segment;
///
/// assert!(validate_prefix_segment("site").is_ok());
/// assert!(validate_prefix_segment("cm:content").is_ok());
/// assert!(validate_prefix_segment("").is_err());
/// assert!(validate_prefix_segment("a/b").is_err());
/// ```
pub fn validate_prefix_segment(segment: &str) -> Result<(), AddressError> {
    let invalid = |reason: &str| AddressError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.to_string(),
    };

    if segment.is_empty() {
        return Err(invalid("segment must not be empty"));
    }
    if segment.contains('/') {
        return Err(invalid("segment must not contain '/'"));
    }
    if segment.contains(PROTOCOL_DELIMITER) {
        return Err(invalid("segment must not contain the protocol delimiter"));
    }
    if let Some(ch) = segment
        .chars()
        .find(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Validate a configured route value (mapping key).
pub fn validate_route_value(value: &str) -> Result<(), AddressError> {
    validate_prefix_segment(value)?;
    if value.starts_with(RESERVED_ROUTE_MARKER) {
        return Err(AddressError::InvalidSegment {
            segment: value.to_string(),
            reason: format!("route values must not start with '{RESERVED_ROUTE_MARKER}'"),
        });
    }
    Ok(())
}
