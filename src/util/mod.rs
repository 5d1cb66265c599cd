//! Utility functions shared by the rule source and the feed client.
//!
//! - **URL validation**: only http(s) endpoints are accepted
//! - **Bounded reads**: response bodies are capped to avoid memory exhaustion

mod body;
mod url_validator;

pub use body::{read_limited_bytes, BodyError};
pub use url_validator::{validate_url, UrlValidationError};
