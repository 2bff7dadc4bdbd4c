use contour_store::StoreError;
use contour_types::{NodeRef, QName};

/// Errors reported by the host repository collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeRef),

    #[error("host repository error: {0}")]
    Backend(String),
}

/// Result alias for host collaborator calls.
pub type HostResult<T> = Result<T, HostError>;

/// Errors from the copy-then-rewrite migration sequence.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A store call failed while migrating one property of one node.
    #[error("storage failure migrating {property} of {node}: {source}")]
    Storage {
        node: NodeRef,
        property: QName,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

impl MigrationError {
    pub fn storage(node: &NodeRef, property: &QName, source: impl Into<StoreError>) -> Self {
        Self::Storage {
            node: node.clone(),
            property: property.clone(),
            source: source.into(),
        }
    }

    /// The underlying store error, if this is a storage failure.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Storage { source, .. } => Some(source),
            Self::Host(_) => None,
        }
    }
}

/// Result alias for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;
