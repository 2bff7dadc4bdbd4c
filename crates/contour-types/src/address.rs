use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;
use crate::names::validate_prefix_segment;

/// Separator between protocol and identifier.
pub const PROTOCOL_DELIMITER: &str = "://";

/// Protocol meaning "whatever protocol the addressed store handles".
///
/// Only used for existence probes, reads and requested-address writes; a
/// store never hands out an address carrying this protocol.
pub const WILDCARD_PROTOCOL: &str = "wildcard-store";

/// Leading identifier segment announcing routing prefixes, e.g. `_rp2`.
pub const PREFIX_DESCRIPTOR: &str = "_rp";

/// Address of one stored content object: `protocol://identifier`.
///
/// The identifier may start with routing prefixes which record the route
/// a piece of content was written through:
///
/// ```text
/// mem://_rp2/selector/a/2026/0b1e.bin
///       ^^^^ ^^^^^^^^^^ ^^^^^^^^^^^^^
///       |    prefixes   base identifier
///       descriptor (2 prefix segments follow)
/// ```
///
/// Parsing splits on the *first* delimiter only, so identifiers may contain
/// further `://` sequences.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress {
    protocol: String,
    identifier: String,
}

impl ContentAddress {
    /// Build an address from its two parts.
    pub fn new(
        protocol: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let protocol = protocol.into();
        let identifier = identifier.into();
        let display = format!("{protocol}{PROTOCOL_DELIMITER}{identifier}");
        if protocol.is_empty() {
            return Err(AddressError::EmptyProtocol(display));
        }
        if protocol.contains(PROTOCOL_DELIMITER) {
            return Err(AddressError::InvalidProtocol(display));
        }
        if identifier.is_empty() {
            return Err(AddressError::EmptyIdentifier(display));
        }
        Ok(Self {
            protocol,
            identifier,
        })
    }

    /// Parse `protocol://identifier`.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let index = address
            .find(PROTOCOL_DELIMITER)
            .ok_or_else(|| AddressError::MissingDelimiter(address.to_string()))?;
        Self::new(
            &address[..index],
            &address[index + PROTOCOL_DELIMITER.len()..],
        )
    }

    /// Address with the wildcard protocol.
    pub fn wildcard(identifier: impl Into<String>) -> Result<Self, AddressError> {
        Self::new(WILDCARD_PROTOCOL, identifier)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_wildcard(&self) -> bool {
        self.protocol == WILDCARD_PROTOCOL
    }

    /// Same identifier, different protocol.
    pub fn with_protocol(&self, protocol: &str) -> Result<Self, AddressError> {
        Self::new(protocol, self.identifier.clone())
    }

    /// Same identifier under the wildcard protocol.
    pub fn to_wildcard(&self) -> Self {
        Self {
            protocol: WILDCARD_PROTOCOL.to_string(),
            identifier: self.identifier.clone(),
        }
    }

    /// Replace the wildcard protocol with `protocol`; other addresses are
    /// returned unchanged.
    pub fn resolve_wildcard(&self, protocol: &str) -> Self {
        if self.is_wildcard() {
            Self {
                protocol: protocol.to_string(),
                identifier: self.identifier.clone(),
            }
        } else {
            self.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Routing prefixes
    // -----------------------------------------------------------------------

    /// Routing prefixes in outermost-first order. Empty if the identifier
    /// carries no prefix descriptor.
    pub fn prefixes(&self) -> Result<Vec<String>, AddressError> {
        let (prefixes, _) = self.split_prefixes()?;
        Ok(prefixes.into_iter().map(str::to_string).collect())
    }

    /// Returns `true` if at least one routing prefix is present.
    pub fn has_prefixes(&self) -> bool {
        matches!(self.split_prefixes(), Ok((prefixes, _)) if !prefixes.is_empty())
    }

    /// The address with every routing prefix (and the descriptor) removed.
    pub fn base(&self) -> Result<Self, AddressError> {
        let (_, base) = self.split_prefixes()?;
        Self::new(self.protocol.clone(), base)
    }

    /// Prepend `segments` to the routing prefixes already present.
    ///
    /// An existing descriptor is merged rather than nested, so
    /// `p://_rp1/x/id` prefixed with `["y"]` becomes `p://_rp2/y/x/id`.
    pub fn with_prefixes<S: AsRef<str>>(&self, segments: &[S]) -> Result<Self, AddressError> {
        if segments.is_empty() {
            return Ok(self.clone());
        }
        for segment in segments {
            validate_prefix_segment(segment.as_ref())?;
        }
        let (existing, base) = self.split_prefixes()?;
        let mut all: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();
        all.extend(existing);
        Self::new(self.protocol.clone(), encode_identifier(&all, base))
    }

    /// If the routing prefixes start with `segments`, return the address
    /// with exactly those leading segments removed.
    pub fn strip_leading_prefixes<S: AsRef<str>>(
        &self,
        segments: &[S],
    ) -> Result<Option<Self>, AddressError> {
        let (existing, base) = self.split_prefixes()?;
        if segments.is_empty() || existing.len() < segments.len() {
            return Ok(None);
        }
        let matches = segments
            .iter()
            .zip(existing.iter())
            .all(|(wanted, present)| wanted.as_ref() == *present);
        if !matches {
            return Ok(None);
        }
        let remaining = &existing[segments.len()..];
        let stripped = Self::new(self.protocol.clone(), encode_identifier(remaining, base))?;
        Ok(Some(stripped))
    }

    fn split_prefixes(&self) -> Result<(Vec<&str>, &str), AddressError> {
        let identifier = self.identifier.as_str();
        let Some((first, mut rest)) = identifier.split_once('/') else {
            return Ok((Vec::new(), identifier));
        };
        let Some(count) = descriptor_count(first) else {
            return Ok((Vec::new(), identifier));
        };

        let malformed = || AddressError::MalformedPrefixes {
            address: self.to_string(),
            expected: count,
        };
        let mut prefixes = Vec::with_capacity(count.min(8));
        for _ in 0..count {
            let (segment, tail) = rest.split_once('/').ok_or_else(malformed)?;
            prefixes.push(segment);
            rest = tail;
        }
        if rest.is_empty() {
            return Err(malformed());
        }
        Ok((prefixes, rest))
    }
}

fn descriptor_count(segment: &str) -> Option<usize> {
    let digits = segment.strip_prefix(PREFIX_DESCRIPTOR)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn encode_identifier(prefixes: &[&str], base: &str) -> String {
    if prefixes.is_empty() {
        return base.to_string();
    }
    let mut identifier = format!("{PREFIX_DESCRIPTOR}{}/", prefixes.len());
    for prefix in prefixes {
        identifier.push_str(prefix);
        identifier.push('/');
    }
    identifier.push_str(base);
    identifier
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({self})")
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PROTOCOL_DELIMITER}{}", self.protocol, self.identifier)
    }
}

impl FromStr for ContentAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.to_string()
    }
}
