//! Utility functions shared by the fetch and publish steps.
//!
//! - **URL validation**: refuse to send the API token over plain HTTP
//! - **Files**: atomic replacement of the artifact
//! - **HTTP**: size-capped response bodies

mod fs;
mod http;
mod url_validator;

pub use fs::atomic_write;
pub use http::{read_limited_bytes, BodyError};
pub use url_validator::{validate_api_base_url, UrlValidationError};
