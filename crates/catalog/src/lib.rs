//! Organization and application listings.
//!
//! [`Catalog`] holds the last-fetched lists together with the current
//! selection. Each fetch replaces its list wholesale; a failed fetch leaves
//! the previous list in place.

mod catalog;
mod error;
mod types;

pub use catalog::{APPLICATIONS_PATH, Catalog, ORGANIZATIONS_PATH};
pub use error::CatalogError;
pub use types::{Application, DEFAULT_APP_VERSION, Organization, normalize_list};
