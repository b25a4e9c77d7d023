//! URL handling module for Tagsweep
//!
//! This module provides input normalization, domain-key extraction, and the
//! variation generator used as a fallback once the original URL gives up.

mod domain;
mod normalize;
mod variations;

// Re-export main functions
pub use domain::extract_domain;
pub use normalize::{normalize_url, parse_http_url};
pub use variations::{variations, Variation, VariationKind, Variations};
