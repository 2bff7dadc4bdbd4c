use contour_types::AddressError;

/// Errors raised while building a router or policy from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A policy was configured without any mapping entries.
    #[error("policy '{0}' has an empty store mapping")]
    EmptyMapping(String),

    /// A mapping names a store that was never registered.
    #[error("unknown store '{0}'")]
    UnknownStore(String),

    /// A store name was registered twice.
    #[error("store '{0}' is already registered")]
    DuplicateStore(String),

    /// A mapping key or prefix segment is not a valid route value.
    #[error("invalid route value: {0}")]
    InvalidRoute(#[from] AddressError),

    /// The fallback store must accept writes.
    #[error("fallback store '{0}' is read-only")]
    ReadOnlyFallback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_errors_convert() {
        let err: ConfigError = contour_types::validate_route_value("_x").unwrap_err().into();
        assert!(matches!(err, ConfigError::InvalidRoute(_)));
        assert!(err.to_string().contains("_x"));
    }
}
