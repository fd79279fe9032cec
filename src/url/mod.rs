//! URL handling module
//!
//! This module provides URL canonicalization, href resolution against a page
//! URL, and the same-origin gate that scopes the crawl to the seed host.

mod normalize;
mod scope;

pub use normalize::{canonicalize, parse_seed};
pub use scope::{resolve_candidate, same_host};
