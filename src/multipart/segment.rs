//! Ordered body segments.
//!
//! A form body is a run of in-memory buffers interleaved with byte sources
//! whose contents are only read while the body is written out.

use bytes::BytesMut;
use std::fmt;
use std::mem;
use tokio::io::AsyncRead;

/// Default read size used when streaming a source segment.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A readable byte source owned by a file part.
pub type BoxedSource = Box<dyn AsyncRead + Send + Unpin>;

/// One piece of the encoded body.
pub enum Segment {
    /// Encoded headers and text values, held in memory.
    Buffer(BufferSegment),
    /// File contents, read lazily during emission.
    Source(SourceSegment),
}

impl Segment {
    /// Returns the byte length of the segment when it is known without
    /// reading it.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Segment::Buffer(buf) => Some(buf.len() as u64),
            Segment::Source(src) => src.known_len,
        }
    }

    /// Reports whether this segment is a byte source.
    pub fn is_source(&self) -> bool {
        matches!(self, Segment::Source(_))
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Buffer(buf) => fmt::Debug::fmt(buf, f),
            Segment::Source(src) => fmt::Debug::fmt(src, f),
        }
    }
}

/// Append-only bytes, remembering the offset at which each part begins.
#[derive(Default)]
pub struct BufferSegment {
    bytes: BytesMut,
    part_starts: Vec<(usize, String)>,
}

impl BufferSegment {
    /// Appends raw bytes.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Marks the current end of the buffer as the start of part `name`.
    pub fn mark_part(&mut self, name: &str) {
        self.part_starts.push((self.bytes.len(), name.to_string()));
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Reports whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Splits the buffer where parts begin.
    ///
    /// Each run carries the name of the part it belongs to; bytes before the
    /// first mark continue the part opened in an earlier segment and carry
    /// `None`.
    pub fn runs(&self) -> Vec<(Option<&str>, &[u8])> {
        let mut runs = Vec::with_capacity(self.part_starts.len() + 1);
        let mut start = 0;
        let mut part = None;
        for (offset, name) in &self.part_starts {
            if *offset > start {
                runs.push((part, &self.bytes[start..*offset]));
            }
            start = *offset;
            part = Some(name.as_str());
        }
        if self.bytes.len() > start {
            runs.push((part, &self.bytes[start..]));
        }
        runs
    }
}

impl fmt::Debug for BufferSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Buffer").field(&self.bytes.len()).finish()
    }
}

/// The body of a file part.
///
/// The reader is taken out exactly once, when the segment is streamed;
/// afterwards only the part's identity remains for diagnostics.
pub struct SourceSegment {
    reader: Option<BoxedSource>,
    /// Form field name of the part.
    pub name: String,
    /// Filename announced in the part's headers.
    pub filename: String,
    /// Length reported by the provider, if any. Informational only.
    pub known_len: Option<u64>,
}

impl SourceSegment {
    /// Wraps a reader as the body of the named part.
    pub fn new(name: String, filename: String, reader: BoxedSource, known_len: Option<u64>) -> Self {
        Self {
            reader: Some(reader),
            name,
            filename,
            known_len,
        }
    }

    /// Takes ownership of the reader, leaving the segment consumed.
    pub fn take_reader(&mut self) -> Option<BoxedSource> {
        self.reader.take()
    }

    /// Reports whether the reader has already been taken.
    pub fn is_consumed(&self) -> bool {
        self.reader.is_none()
    }
}

impl fmt::Debug for SourceSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("known_len", &self.known_len)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Append-only list of segments.
///
/// The last segment is always a buffer, held apart as `tail` so text can be
/// appended to it directly. Pushing a source seals the tail behind it and
/// starts a fresh one.
#[derive(Default)]
pub struct Segments {
    sealed: Vec<Segment>,
    tail: BufferSegment,
}

impl Segments {
    /// Creates a list holding one empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tail buffer.
    pub fn current_buffer(&mut self) -> &mut BufferSegment {
        &mut self.tail
    }

    /// Appends a source segment, followed by a fresh tail buffer.
    pub fn push_source(&mut self, source: SourceSegment) {
        let tail = mem::take(&mut self.tail);
        self.sealed.push(Segment::Buffer(tail));
        self.sealed.push(Segment::Source(source));
    }

    /// Reports whether any segment is a byte source.
    pub fn has_source(&self) -> bool {
        self.sealed.iter().any(Segment::is_source)
    }

    /// Sums the buffer lengths, or `None` if any source is present.
    pub fn buffered_len(&self) -> Option<u64> {
        if self.has_source() {
            return None;
        }
        let sealed: Option<u64> = self.sealed.iter().map(Segment::known_len).sum();
        sealed.map(|len| len + self.tail.len() as u64)
    }

    /// Number of segments, the tail buffer included.
    pub fn segment_count(&self) -> usize {
        self.sealed.len() + 1
    }

    /// Finds a source segment whose reader was already taken.
    pub fn consumed_source(&self) -> Option<&SourceSegment> {
        self.sealed.iter().find_map(|seg| match seg {
            Segment::Source(src) if src.is_consumed() => Some(src),
            _ => None,
        })
    }

    /// Splits into the sealed segments, in order, and the tail buffer.
    pub(crate) fn split_mut(&mut self) -> (&mut [Segment], &BufferSegment) {
        (&mut self.sealed, &self.tail)
    }
}

impl fmt::Debug for Segments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sealed.iter())
            .entry(&self.tail)
            .finish()
    }
}
