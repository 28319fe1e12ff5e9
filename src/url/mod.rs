//! URL helpers for chapter-cache
//!
//! Domain extraction for the blacklist, wildcard domain matching, and the
//! per-origin keys used by the robots.txt cache.

mod domain;
mod matcher;

pub use domain::{extract_domain, origin_key, robots_url};
pub use matcher::matches_wildcard;
