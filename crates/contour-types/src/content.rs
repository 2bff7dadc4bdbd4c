use serde::{Deserialize, Serialize};

use crate::address::ContentAddress;

/// Persisted reference to a content object, as stored in a node property.
///
/// The router only rewrites `address`; the descriptive fields are carried
/// over unchanged when content migrates between stores, even if the new
/// store transparently transforms the bytes (e.g. compresses them).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentData {
    pub address: ContentAddress,
    pub mimetype: Option<String>,
    /// Size in bytes of the logical (untransformed) content.
    pub size: u64,
    pub encoding: Option<String>,
    pub locale: Option<String>,
}

impl ContentData {
    pub fn new(address: ContentAddress, size: u64) -> Self {
        Self {
            address,
            mimetype: None,
            size,
            encoding: None,
            locale: None,
        }
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Same descriptive metadata, different address.
    pub fn relocated(&self, address: ContentAddress) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocated_keeps_metadata() {
        let original = ContentData::new(ContentAddress::parse("a://x").unwrap(), 42)
            .with_mimetype("text/plain")
            .with_encoding("UTF-8")
            .with_locale("en_GB");
        let moved = original.relocated(ContentAddress::parse("b://y").unwrap());
        assert_eq!(moved.address.to_string(), "b://y");
        assert_eq!(moved.mimetype.as_deref(), Some("text/plain"));
        assert_eq!(moved.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(moved.locale.as_deref(), Some("en_GB"));
        assert_eq!(moved.size, 42);
    }
}
