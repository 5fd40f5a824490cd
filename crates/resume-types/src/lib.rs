#![forbid(unsafe_code)]
#![doc = "Common error types for TLS session serialization and resumption."]

pub mod error;

pub use error::*;
