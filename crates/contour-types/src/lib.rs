//! Foundation types for contour, the content-routing layer.
//!
//! Every other contour crate depends on `contour-types`. Nothing here
//! performs I/O; these are the values that flow between the router, its
//! backing stores and the host repository.
//!
//! # Key Types
//!
//! - [`ContentAddress`] -- `protocol://identifier` address, with optional
//!   routing prefixes embedded in the identifier
//! - [`ContentData`] -- persisted content reference (address + mimetype,
//!   size, encoding, locale)
//! - [`NodeRef`], [`QName`], [`PropertyValue`] -- the minimal slice of the
//!   host node model the router reads
//! - [`RoutingCriteria`] -- immutable snapshot of ambient routing values

pub mod address;
pub mod content;
pub mod criteria;
pub mod error;
pub mod names;
pub mod node;

pub use address::{ContentAddress, PREFIX_DESCRIPTOR, PROTOCOL_DELIMITER, WILDCARD_PROTOCOL};
pub use content::ContentData;
pub use criteria::RoutingCriteria;
pub use error::AddressError;
pub use names::{validate_prefix_segment, validate_route_value};
pub use node::{NodeRef, PropertyMap, PropertyValue, QName};
