use contour_types::{AddressError, ContentAddress};

/// Errors from backing-store and routing operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The address is malformed, or no configured store handles it.
    #[error("unsupported content address: {0}")]
    UnsupportedAddress(String),

    /// No object exists at the address.
    #[error("content not found: {0}")]
    NotFound(ContentAddress),

    /// A write requested an address that is already taken.
    #[error("content already exists: {0}")]
    ContentExists(ContentAddress),

    /// I/O failure inside a backing store.
    #[error("I/O error in store '{store}' at {address}: {source}")]
    Io {
        address: ContentAddress,
        store: String,
        #[source]
        source: std::io::Error,
    },

    /// A cached store stopped supporting an address it once claimed.
    #[error("store '{store}' no longer supports cached address {address}")]
    InconsistentCache {
        address: ContentAddress,
        store: String,
    },

    /// The store does not accept writes.
    #[error("store '{0}' is read-only")]
    ReadOnly(String),
}

impl StoreError {
    /// Wrap an I/O failure with the address and store it occurred in.
    pub fn io(address: &ContentAddress, store: &str, source: std::io::Error) -> Self {
        Self::Io {
            address: address.clone(),
            store: store.to_string(),
            source,
        }
    }

    /// Returns `true` for the "no such object" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<AddressError> for StoreError {
    fn from(err: AddressError) -> Self {
        Self::UnsupportedAddress(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
