//! Utility functions shared across pipeline stages.
//!
//! This module provides reusable utilities for:
//!
//! - **URL handling**: SSRF validation, host allowlisting, relative-URL
//!   resolution and link canonicalization
//! - **Text processing**: feed-field cleaning and character-budget truncation
//!
//! # Examples
//!
//! ```
//! use presswire::util::{clean_text, is_host_allowed, truncate_chars};
//!
//! assert!(is_host_allowed("https://media.example.com/a", "https://example.com"));
//! assert_eq!(clean_text("<b>Hi</b> &amp; bye"), "Hi & bye");
//! assert_eq!(truncate_chars("abcdef", 4), "abc…");
//! ```

mod text;
mod url_validator;

pub use text::{clean_text, strip_control_chars, truncate_chars};
pub use url_validator::{
    canonicalize_link, is_host_allowed, normalize_host, origin_of, resolve_url, validate_url,
    UrlValidationError,
};
