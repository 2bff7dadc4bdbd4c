use std::fmt;

use bytes::Bytes;
use contour_types::{validate_prefix_segment, AddressError, ContentAddress};

use crate::content::{ContentReader, WriteContext};
use crate::error::StoreResult;
use crate::traits::{BackingStore, ContentWriter, StoreHandle};

/// Facade that records a routing decision in the addresses it hands out.
///
/// Every address leaving the facade carries the `tag/value` routing prefix;
/// addresses coming in have that prefix stripped if present before being
/// passed to the delegate. Addresses carrying some other prefix pass
/// through unchanged, so content written through a sibling facade over the
/// same delegate stays reachable.
pub struct RoutingPrefixStore {
    name: String,
    segments: [String; 2],
    delegate: StoreHandle,
}

impl RoutingPrefixStore {
    pub fn new(
        tag: impl Into<String>,
        value: impl Into<String>,
        delegate: StoreHandle,
    ) -> Result<Self, AddressError> {
        let tag = tag.into();
        let value = value.into();
        validate_prefix_segment(&tag)?;
        validate_prefix_segment(&value)?;
        Ok(Self {
            name: format!("{}[{tag}/{value}]", delegate.name()),
            segments: [tag, value],
            delegate,
        })
    }

    /// The `[tag, value]` prefix this facade applies.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn delegate(&self) -> &StoreHandle {
        &self.delegate
    }

    fn inbound(&self, address: &ContentAddress) -> StoreResult<ContentAddress> {
        Ok(address
            .strip_leading_prefixes(&self.segments)?
            .unwrap_or_else(|| address.clone()))
    }

    fn outbound(&self, address: &ContentAddress) -> StoreResult<ContentAddress> {
        if address.strip_leading_prefixes(&self.segments)?.is_some() {
            return Ok(address.clone());
        }
        Ok(address.with_prefixes(&self.segments)?)
    }
}

impl BackingStore for RoutingPrefixStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_address(&self, address: &ContentAddress) -> bool {
        match self.inbound(address) {
            Ok(inner) => self.delegate.supports_address(&inner),
            Err(_) => false,
        }
    }

    fn exists(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.delegate.exists(&self.inbound(address)?)
    }

    fn read(&self, address: &ContentAddress) -> StoreResult<ContentReader> {
        let reader = self.delegate.read(&self.inbound(address)?)?;
        let outer = self.outbound(reader.address())?;
        Ok(reader.with_address(outer))
    }

    fn write(&self, context: &WriteContext) -> StoreResult<Box<dyn ContentWriter>> {
        let mut inner_context = context.clone();
        if let Some(requested) = &context.address {
            inner_context.address = Some(self.inbound(requested)?);
        }
        let inner = self.delegate.write(&inner_context)?;
        let address = self.outbound(inner.address())?;
        Ok(Box::new(PrefixedWriter { inner, address }))
    }

    fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.delegate.delete(&self.inbound(address)?)
    }

    fn is_write_supported(&self) -> bool {
        self.delegate.is_write_supported()
    }
}

impl fmt::Debug for RoutingPrefixStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingPrefixStore")
            .field("prefix", &self.segments.join("/"))
            .field("delegate", &self.delegate.name())
            .finish()
    }
}

struct PrefixedWriter {
    inner: Box<dyn ContentWriter>,
    address: ContentAddress,
}

impl ContentWriter for PrefixedWriter {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn put_content(self: Box<Self>, content: Bytes) -> StoreResult<u64> {
        self.inner.put_content(content)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::InMemoryBackingStore;

    fn addr(s: &str) -> ContentAddress {
        ContentAddress::parse(s).unwrap()
    }

    fn setup() -> (Arc<InMemoryBackingStore>, RoutingPrefixStore) {
        let physical = Arc::new(InMemoryBackingStore::new("primary", "mem"));
        let facade =
            RoutingPrefixStore::new("site", "finance", physical.clone() as StoreHandle).unwrap();
        (physical, facade)
    }

    #[test]
    fn rejects_invalid_segments() {
        let physical: StoreHandle = Arc::new(InMemoryBackingStore::new("primary", "mem"));
        assert!(RoutingPrefixStore::new("site", "a/b", physical.clone()).is_err());
        assert!(RoutingPrefixStore::new("", "x", physical).is_err());
    }

    #[test]
    fn written_addresses_carry_the_prefix() {
        let (physical, facade) = setup();
        let writer = facade.write(&WriteContext::new()).unwrap();
        let address = writer.address().clone();
        writer.put_content(Bytes::from_static(b"data")).unwrap();

        assert_eq!(address.prefixes().unwrap(), vec!["site", "finance"]);
        assert!(facade.exists(&address).unwrap());
        assert!(physical.exists(&address.base().unwrap()).unwrap());

        let reader = facade.read(&address).unwrap();
        assert_eq!(reader.address(), &address);
        assert_eq!(reader.content().as_ref(), b"data");
    }

    #[test]
    fn foreign_prefixes_pass_through() {
        let (physical, facade) = setup();
        physical.insert("x", &b"data"[..]).unwrap();
        let other = addr("mem://_rp2/site/_default/x");
        assert!(facade.supports_address(&other));
        assert!(facade.exists(&other).unwrap());

        let reader = facade.read(&other).unwrap();
        assert_eq!(reader.address().to_string(), "mem://_rp2/site/finance/x");
    }

    #[test]
    fn wildcard_probe_through_facade() {
        let (physical, facade) = setup();
        physical.insert("x", &b"data"[..]).unwrap();
        assert!(facade.exists(&addr("wildcard-store://_rp2/site/finance/x")).unwrap());
        assert!(facade.exists(&addr("wildcard-store://x")).unwrap());
        assert!(!facade.exists(&addr("wildcard-store://y")).unwrap());
    }

    #[test]
    fn requested_address_is_stripped_and_reprefixed() {
        let (_physical, facade) = setup();
        let ctx = WriteContext::new().with_address(addr("wildcard-store://_rp2/site/other/x"));
        let writer = facade.write(&ctx).unwrap();
        assert_eq!(writer.address().to_string(), "mem://_rp2/site/finance/x");
    }

    #[test]
    fn delete_strips_prefix() {
        let (physical, facade) = setup();
        physical.insert("x", &b"data"[..]).unwrap();
        assert!(facade.delete(&addr("mem://_rp2/site/finance/x")).unwrap());
        assert!(physical.is_empty());
    }

    #[test]
    fn nested_facades_stack_prefixes() {
        let (physical, facade) = setup();
        let outer = RoutingPrefixStore::new("tenant", "acme", Arc::new(facade) as StoreHandle).unwrap();
        let writer = outer.write(&WriteContext::new()).unwrap();
        let address = writer.address().clone();
        writer.put_content(Bytes::from_static(b"data")).unwrap();

        assert_eq!(
            address.prefixes().unwrap(),
            vec!["tenant", "acme", "site", "finance"]
        );
        assert_eq!(physical.len(), 1);
        assert_eq!(outer.read(&address).unwrap().address(), &address);
    }
}
