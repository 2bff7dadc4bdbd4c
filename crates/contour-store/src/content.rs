use bytes::Bytes;
use contour_types::{ContentAddress, ContentData, NodeRef, QName, RoutingCriteria};

/// The bytes of one stored object plus its content metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentReader {
    data: ContentData,
    content: Bytes,
}

impl ContentReader {
    pub fn new(address: ContentAddress, content: Bytes) -> Self {
        let data = ContentData::new(address, content.len() as u64);
        Self { data, content }
    }

    /// Address the object was read from, as reported by the store.
    pub fn address(&self) -> &ContentAddress {
        &self.data.address
    }

    pub fn data(&self) -> &ContentData {
        &self.data
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    pub fn size(&self) -> u64 {
        self.data.size
    }

    /// Same bytes reported under a different address.
    pub fn with_address(mut self, address: ContentAddress) -> Self {
        self.data.address = address;
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.data.mimetype = Some(mimetype.into());
        self
    }
}

/// Everything a store may use to place a new object.
#[derive(Clone, Debug, Default)]
pub struct WriteContext {
    /// Requested address; `None` lets the store pick one.
    pub address: Option<ContentAddress>,
    /// Source of a copy, for stores that can optimise copy-on-write.
    pub existing_reader: Option<ContentReader>,
    pub node: Option<NodeRef>,
    pub property: Option<QName>,
    /// Ambient routing values captured when the write started.
    pub criteria: RoutingCriteria,
}

impl WriteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: ContentAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_existing_reader(mut self, reader: ContentReader) -> Self {
        self.existing_reader = Some(reader);
        self
    }

    pub fn for_property(mut self, node: NodeRef, property: QName) -> Self {
        self.node = Some(node);
        self.property = Some(property);
        self
    }

    pub fn with_criteria(mut self, criteria: RoutingCriteria) -> Self {
        self.criteria = criteria;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_size_and_readdresses() {
        let reader = ContentReader::new(
            ContentAddress::parse("mem://x").unwrap(),
            Bytes::from_static(b"hello"),
        )
        .with_mimetype("text/plain");
        assert_eq!(reader.size(), 5);
        assert_eq!(reader.data().mimetype.as_deref(), Some("text/plain"));

        let moved = reader.with_address(ContentAddress::parse("mem://_rp1/p/x").unwrap());
        assert_eq!(moved.address().to_string(), "mem://_rp1/p/x");
        assert_eq!(moved.content().as_ref(), b"hello");
    }

    #[test]
    fn write_context_builder() {
        let ctx = WriteContext::new()
            .with_address(ContentAddress::parse("mem://x").unwrap())
            .for_property(NodeRef::new("n1"), QName::new("cm:content"))
            .with_criteria(RoutingCriteria::new().with_site("finance"));
        assert!(ctx.address.is_some());
        assert_eq!(ctx.node, Some(NodeRef::new("n1")));
        assert_eq!(ctx.criteria.site.as_deref(), Some("finance"));
        assert!(ctx.existing_reader.is_none());
    }
}
