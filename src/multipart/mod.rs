//! Multipart form-data encoding.

pub mod builder;
pub mod segment;

pub use builder::{FormBuilder, FormState, DEFAULT_CONTENT_TYPE};
pub use segment::{BufferSegment, Segment, Segments, SourceSegment, DEFAULT_CHUNK_SIZE};
