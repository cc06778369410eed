//! Streaming `multipart/form-data` request body encoder with async-first design.
//!
//! This crate provides:
//! - Random multipart boundary generation (RFC 2046)
//! - Text and file part encoding (RFC 7578)
//! - Exact content length when the body holds no file sources
//! - Ordered, chunked emission of the body to any `AsyncWrite` sink
//!
//! File contents are never buffered in memory; they are read from their
//! sources only while the body is written.

pub mod boundary;
pub mod error;
pub mod multipart;

// Re-export commonly used types
pub use boundary::generate_boundary;
pub use error::{Error, Result};
pub use multipart::FormBuilder;
