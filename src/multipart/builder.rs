//! Multipart form-data body builder.
//!
//! Parts are encoded into in-memory buffers as they are appended; file
//! contents stay in their sources until [`FormBuilder::write_to`] streams
//! them out in order.

use crate::boundary::{format_boundary_param, generate_boundary, validate_boundary};
use crate::error::{Error, Result};
use crate::multipart::segment::{
    BoxedSource, BufferSegment, Segment, Segments, SourceSegment, DEFAULT_CHUNK_SIZE,
};
use futures::StreamExt;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace, warn};

/// Content type announced for file parts when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Encoding progress of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    /// No part appended yet; the opening boundary is unwritten.
    Empty,
    /// At least one part appended; more may follow.
    Building,
    /// Closing boundary written (or an empty form sealed). Terminal.
    Finalized,
}

/// Builds a `multipart/form-data` request body.
///
/// A builder serves one request: append parts, ask for the length and
/// content type, then call [`write_to`](Self::write_to) once. File sources
/// are consumed by the write, so it cannot be repeated for a form that has
/// any; a second attempt fails with [`Error::SourceConsumed`] instead of
/// producing truncated output.
///
/// # Examples
///
/// ```no_run
/// use tokio_formdata::multipart::FormBuilder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut form = FormBuilder::new();
/// form.add_text_part("user", "alice")?;
/// form.add_file_path("avatar", "avatar.png").await?;
///
/// let content_type = form.content_type_header();
/// let length = form.content_length(); // None: the file is streamed
///
/// let mut body = Vec::new();
/// form.write_to(&mut body).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FormBuilder {
    boundary: String,
    segments: Segments,
    state: FormState,
    parts: usize,
    chunk_size: usize,
}

impl FormBuilder {
    /// Creates an empty form with a freshly generated boundary.
    pub fn new() -> Self {
        Self::from_boundary(generate_boundary())
    }

    /// Creates an empty form with a caller-chosen boundary.
    ///
    /// The boundary must be 1-70 characters and contain only characters
    /// RFC 2046 allows.
    pub fn with_boundary(boundary: impl Into<String>) -> Result<Self> {
        let boundary = boundary.into();
        validate_boundary(&boundary)?;
        Ok(Self::from_boundary(boundary))
    }

    fn from_boundary(boundary: String) -> Self {
        Self {
            boundary,
            segments: Segments::new(),
            state: FormState::Empty,
            parts: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets how many bytes are read from a file source at a time.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the form's boundary string.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the value for the request's `Content-Type` header.
    pub fn content_type_header(&self) -> String {
        format!(
            "multipart/form-data; boundary={}",
            format_boundary_param(&self.boundary)
        )
    }

    /// Returns the current encoding state.
    pub fn state(&self) -> FormState {
        self.state
    }

    /// Returns how many parts have been appended.
    pub fn part_count(&self) -> usize {
        self.parts
    }

    /// Appends a text field.
    ///
    /// The name is written as given; quotes in it are not escaped.
    pub fn add_text_part(&mut self, name: &str, value: &str) -> Result<()> {
        let buf = self.begin_part(name)?;
        buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Appends a file part read from `source`, typed `application/octet-stream`.
    ///
    /// The builder takes ownership of the source and drops it once its
    /// contents have been written.
    pub fn add_file_part<R>(&mut self, name: &str, filename: &str, source: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.push_file_part(name, filename, Box::new(source), DEFAULT_CONTENT_TYPE, None)
    }

    /// Appends a file part read from `source` with an explicit content type.
    pub fn add_file_part_with_type<R>(
        &mut self,
        name: &str,
        filename: &str,
        source: R,
        content_type: &str,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.push_file_part(name, filename, Box::new(source), content_type, None)
    }

    /// Opens the file at `path` and appends it as a file part.
    ///
    /// The filename sent is the last component of `path`. Fails with
    /// [`Error::ResourceUnavailable`] if the path cannot be opened or is not
    /// a regular file.
    pub async fn add_file_path(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        if self.state == FormState::Finalized {
            return Err(self.reject_append(name));
        }

        let path = path.as_ref();
        let unavailable = |source: io::Error| Error::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).await.map_err(unavailable)?;
        let meta = file.metadata().await.map_err(unavailable)?;
        if !meta.is_file() {
            return Err(unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        // The length is only a hint for diagnostics.
        let known_len = Some(meta.len());
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.push_file_part(name, &filename, Box::new(file), DEFAULT_CONTENT_TYPE, known_len)
    }

    fn push_file_part(
        &mut self,
        name: &str,
        filename: &str,
        source: BoxedSource,
        content_type: &str,
        known_len: Option<u64>,
    ) -> Result<()> {
        let buf = self.begin_part(name)?;
        buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        buf.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        buf.extend_from_slice(b"Content-Transfer-Encoding: binary\r\n\r\n");

        self.segments.push_source(SourceSegment::new(
            name.to_string(),
            filename.to_string(),
            source,
            known_len,
        ));
        Ok(())
    }

    /// Writes the delimiter that opens a new part and returns the buffer
    /// the part's headers go into.
    fn begin_part(&mut self, name: &str) -> Result<&mut BufferSegment> {
        let delimiter = match self.state {
            FormState::Finalized => return Err(self.reject_append(name)),
            FormState::Empty => format!("--{}\r\n", self.boundary),
            FormState::Building => format!("\r\n--{}\r\n", self.boundary),
        };
        self.state = FormState::Building;
        self.parts += 1;

        let buf = self.segments.current_buffer();
        buf.mark_part(name);
        buf.extend_from_slice(delimiter.as_bytes());
        Ok(buf)
    }

    fn reject_append(&self, name: &str) -> Error {
        warn!(boundary = %self.boundary, part = name, "append rejected: form is finalized");
        Error::Finalized
    }

    /// Writes the closing boundary if it has not been written yet.
    ///
    /// A form with no parts is sealed without any boundary at all. After
    /// this call no more parts can be appended.
    pub fn finalize(&mut self) {
        match self.state {
            FormState::Finalized => {}
            FormState::Empty => self.state = FormState::Finalized,
            FormState::Building => {
                let closing = format!("\r\n--{}--\r\n", self.boundary);
                self.segments
                    .current_buffer()
                    .extend_from_slice(closing.as_bytes());
                self.state = FormState::Finalized;
            }
        }
    }

    /// Returns the exact body length, or `None` when a file part is present.
    ///
    /// Finalizes the form. Sources are never read, so this can be called
    /// any number of times before [`write_to`](Self::write_to).
    pub fn content_length(&mut self) -> Option<u64> {
        self.finalize();
        self.segments.buffered_len()
    }

    /// Writes the whole body to `sink` and flushes it.
    ///
    /// Finalizes the form first. File sources are read in chunks and
    /// dropped as soon as they are exhausted or fail. Returns the number of
    /// bytes written.
    ///
    /// Not repeatable for forms with file parts: sources are consumed, and a
    /// second call fails with [`Error::SourceConsumed`] before writing
    /// anything.
    pub async fn write_to<W>(&mut self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.finalize();

        if let Some(src) = self.segments.consumed_source() {
            return Err(Error::SourceConsumed {
                name: src.name.clone(),
                filename: src.filename.clone(),
            });
        }

        debug!(
            boundary = %self.boundary,
            parts = self.parts,
            segments = self.segments.segment_count(),
            "writing form body"
        );

        let chunk_size = self.chunk_size;
        let (sealed, tail) = self.segments.split_mut();
        let mut part = None;
        let mut written = 0u64;
        for segment in sealed.iter_mut() {
            match segment {
                Segment::Buffer(buf) => {
                    written += write_buffer(buf, sink, &mut part).await?;
                }
                Segment::Source(src) => {
                    written += stream_source(src, sink, chunk_size).await?;
                    part = Some(src.name.clone());
                }
            }
        }
        written += write_buffer(tail, sink, &mut part).await?;
        sink.flush().await?;

        debug!(boundary = %self.boundary, bytes = written, "finished writing form body");
        Ok(written)
    }

    /// Always `false`: the length is either exact or unknown, never negotiated.
    pub fn is_chunked(&self) -> bool {
        false
    }

    /// Always `false`: the body is produced by [`write_to`](Self::write_to),
    /// not exposed as a live stream.
    pub fn is_streaming(&self) -> bool {
        false
    }

    /// Reports whether [`write_to`](Self::write_to) can be called again,
    /// which holds only for forms without file parts.
    pub fn is_repeatable(&self) -> bool {
        !self.segments.has_source()
    }

    /// The body is never content-encoded.
    pub fn content_encoding(&self) -> Option<&str> {
        None
    }

    /// Reading the assembled body back as a stream is not supported; use
    /// [`write_to`](Self::write_to).
    pub fn content(&self) -> Result<BoxedSource> {
        Err(Error::UnsupportedOperation(
            "form body can only be written, not read back",
        ))
    }

    /// Releases body resources. Nothing is held beyond the builder itself,
    /// so this is a no-op for a non-streaming body.
    pub fn consume_content(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::UnsupportedOperation(
                "streaming body does not support consume_content",
            ));
        }
        Ok(())
    }
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a buffer segment part by part, so a failing write can name the
/// part it interrupted. `part` tracks the part open across segments.
async fn write_buffer<W>(buf: &BufferSegment, sink: &mut W, part: &mut Option<String>) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    for (name, bytes) in buf.runs() {
        if let Some(name) = name {
            *part = Some(name.to_string());
        }
        if let Err(source) = sink.write_all(bytes).await {
            return Err(match part {
                Some(name) => {
                    warn!(part = %name, error = %source, "failed to write part");
                    Error::FieldIo {
                        name: name.clone(),
                        source,
                    }
                }
                None => Error::Io(source),
            });
        }
    }
    Ok(buf.len() as u64)
}

/// Copies one source segment to the sink, returning the bytes copied.
async fn stream_source<W>(src: &mut SourceSegment, sink: &mut W, chunk_size: usize) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let reader = src.take_reader().ok_or_else(|| Error::SourceConsumed {
        name: src.name.clone(),
        filename: src.filename.clone(),
    })?;

    let part_error = |source: io::Error| {
        warn!(part = %src.name, filename = %src.filename, error = %source, "failed to stream part");
        Error::PartIo {
            name: src.name.clone(),
            filename: src.filename.clone(),
            source,
        }
    };

    // The reader is dropped with the stream, on success and on error alike.
    let mut chunks = ReaderStream::with_capacity(reader, chunk_size);
    let mut copied = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(part_error)?;
        sink.write_all(&chunk).await.map_err(part_error)?;
        copied += chunk.len() as u64;
    }

    trace!(
        part = %src.name,
        filename = %src.filename,
        known_len = ?src.known_len,
        bytes = copied,
        "streamed file part"
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use tracing_test::traced_test;

    /// Accepts `limit` bytes, then fails every write.
    struct ShortSink {
        data: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for ShortSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let room = self.limit - self.data.len();
            if room == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed")));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Yields `data`, then fails.
    struct FailingReader {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "device lost"))),
            }
        }
    }

    async fn render(form: &mut FormBuilder) -> String {
        let mut output = Vec::new();
        form.write_to(&mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_text_and_file_wire_format() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_text_part("field1", "value1").unwrap();
        form.add_file_part("file1", "a.txt", Cursor::new(b"hi".to_vec()))
            .unwrap();

        assert_eq!(
            render(&mut form).await,
            "--B\r\n\
             Content-Disposition: form-data; name=\"field1\"\r\n\r\n\
             value1\r\n\
             --B\r\n\
             Content-Disposition: form-data; name=\"file1\"; filename=\"a.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n\
             hi\r\n\
             --B--\r\n"
        );
    }

    #[tokio::test]
    async fn test_text_only_wire_format() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_text_part("a", "1").unwrap();
        form.add_text_part("b", "2").unwrap();

        assert_eq!(
            render(&mut form).await,
            "--B\r\n\
             Content-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n\
             --B\r\n\
             Content-Disposition: form-data; name=\"b\"\r\n\r\n2\r\n\
             --B--\r\n"
        );
    }

    #[tokio::test]
    async fn test_file_then_text_gets_separator() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_file_part_with_type("doc", "d.json", Cursor::new(b"{}".to_vec()), "application/json")
            .unwrap();
        form.add_text_part("after", "x").unwrap();

        assert_eq!(
            render(&mut form).await,
            "--B\r\n\
             Content-Disposition: form-data; name=\"doc\"; filename=\"d.json\"\r\n\
             Content-Type: application/json\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n\
             {}\r\n\
             --B\r\n\
             Content-Disposition: form-data; name=\"after\"\r\n\r\nx\r\n\
             --B--\r\n"
        );
    }

    #[tokio::test]
    async fn test_empty_form_writes_nothing() {
        let mut form = FormBuilder::new();
        assert_eq!(form.content_length(), Some(0));

        let mut output = Vec::new();
        let written = form.write_to(&mut output).await.unwrap();
        assert_eq!(written, 0);
        assert!(output.is_empty());
        assert_eq!(form.state(), FormState::Finalized);
    }

    #[tokio::test]
    async fn test_content_length_matches_output() {
        let mut form = FormBuilder::new();
        form.add_text_part("name", "value").unwrap();
        form.add_text_part("other", "ünïcödé").unwrap();

        let length = form.content_length().unwrap();
        assert_eq!(form.content_length(), Some(length));

        let mut output = Vec::new();
        let written = form.write_to(&mut output).await.unwrap();
        assert_eq!(written, length);
        assert_eq!(output.len() as u64, length);
    }

    #[tokio::test]
    async fn test_content_length_unknown_with_source() {
        let mut form = FormBuilder::new();
        form.add_text_part("name", "value").unwrap();
        form.add_file_part("f", "f.bin", Cursor::new(vec![1u8, 2, 3]))
            .unwrap();

        assert_eq!(form.content_length(), None);
        assert_eq!(form.content_length(), None);

        // The source is still fully readable afterwards.
        let mut output = Vec::new();
        form.write_to(&mut output).await.unwrap();
        assert!(output.windows(3).any(|w| w == [1u8, 2, 3]));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mut form = FormBuilder::new();
        assert_eq!(form.state(), FormState::Empty);

        form.add_text_part("a", "b").unwrap();
        assert_eq!(form.state(), FormState::Building);
        assert_eq!(form.part_count(), 1);

        form.finalize();
        assert_eq!(form.state(), FormState::Finalized);

        let length = form.content_length();
        form.finalize();
        assert_eq!(form.content_length(), length);
    }

    #[tokio::test]
    async fn test_append_after_finalize_fails() {
        let mut form = FormBuilder::new();
        form.add_text_part("a", "b").unwrap();
        form.content_length();

        assert!(matches!(form.add_text_part("c", "d"), Err(Error::Finalized)));
        assert!(matches!(
            form.add_file_part("f", "f.bin", Cursor::new(Vec::new())),
            Err(Error::Finalized)
        ));
        assert!(matches!(
            form.add_file_path("p", "/does/not/matter").await,
            Err(Error::Finalized)
        ));
        assert_eq!(form.part_count(), 1);
    }

    #[tokio::test]
    async fn test_source_failure_aborts_write() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_text_part("before", "ok").unwrap();
        form.add_file_part("upload", "broken.bin", FailingReader { data: Some(&b"partial"[..]) })
            .unwrap();
        form.add_text_part("after", "never").unwrap();

        let mut output = Vec::new();
        let err = form.write_to(&mut output).await.unwrap_err();
        match err {
            Error::PartIo { name, filename, source } => {
                assert_eq!(name, "upload");
                assert_eq!(filename, "broken.bin");
                assert_eq!(source.to_string(), "device lost");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let text = String::from_utf8(output).unwrap();
        assert!(text.ends_with("partial"));
        assert!(!text.contains("after"));
    }

    #[tokio::test]
    async fn test_second_write_with_source_fails_fast() {
        let mut form = FormBuilder::new();
        form.add_file_part("f", "f.bin", Cursor::new(b"abc".to_vec()))
            .unwrap();
        assert!(!form.is_repeatable());

        let mut first = Vec::new();
        form.write_to(&mut first).await.unwrap();

        let mut second = Vec::new();
        let err = form.write_to(&mut second).await.unwrap_err();
        assert!(matches!(err, Error::SourceConsumed { ref name, .. } if name == "f"));
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_buffer_only_form_is_repeatable() {
        let mut form = FormBuilder::new();
        form.add_text_part("a", "b").unwrap();
        assert!(form.is_repeatable());

        let first = render(&mut form).await;
        let second = render(&mut form).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_small_chunk_size_streams_everything() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut form = FormBuilder::with_boundary("B").unwrap().with_chunk_size(7);
        form.add_file_part("blob", "blob.bin", Cursor::new(payload.clone()))
            .unwrap();

        let mut output = Vec::new();
        form.write_to(&mut output).await.unwrap();
        assert!(output.windows(payload.len()).any(|w| w == payload.as_slice()));
    }

    #[test]
    fn test_chunk_size_zero_is_clamped() {
        let form = FormBuilder::new().with_chunk_size(0);
        assert_eq!(form.chunk_size, 1);
    }

    #[test]
    fn test_content_type_header() {
        let form = FormBuilder::with_boundary("abc123").unwrap();
        assert_eq!(
            form.content_type_header(),
            "multipart/form-data; boundary=abc123"
        );

        let form = FormBuilder::new();
        assert_eq!(
            form.content_type_header(),
            format!("multipart/form-data; boundary={}", form.boundary())
        );
    }

    #[test]
    fn test_invalid_boundary_rejected() {
        assert!(matches!(
            FormBuilder::with_boundary(""),
            Err(Error::InvalidBoundary(_))
        ));
        assert!(FormBuilder::with_boundary("a".repeat(71)).is_err());
    }

    #[test]
    fn test_entity_accessors() {
        let mut form = FormBuilder::new();
        assert!(!form.is_chunked());
        assert!(!form.is_streaming());
        assert!(form.content_encoding().is_none());
        assert!(matches!(form.content(), Err(Error::UnsupportedOperation(_))));
        assert!(form.consume_content().is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_resource_unavailable() {
        let mut form = FormBuilder::new();
        let err = form
            .add_file_path("f", "/definitely/not/here.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable { .. }));
        assert_eq!(form.state(), FormState::Empty);
        assert_eq!(form.part_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_path_is_resource_unavailable() {
        let mut form = FormBuilder::new();
        let dir = std::env::temp_dir();
        match form.add_file_path("d", &dir).await {
            Err(Error::ResourceUnavailable { path, source }) => {
                assert_eq!(path, dir);
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("expected ResourceUnavailable, got {:?}", other),
        }
        assert_eq!(form.state(), FormState::Empty);
        assert_eq!(form.part_count(), 0);
        assert_eq!(form.content_length(), Some(0));
    }

    #[tokio::test]
    async fn test_sink_failure_in_headers_names_the_part() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_text_part("first", "1").unwrap();
        form.add_text_part("second", "2").unwrap();

        // Fails three bytes into the second part's delimiter.
        let first_len = "--B\r\nContent-Disposition: form-data; name=\"first\"\r\n\r\n1".len();
        let mut sink = ShortSink {
            data: Vec::new(),
            limit: first_len + 3,
        };
        match form.write_to(&mut sink).await {
            Err(Error::FieldIo { name, source }) => {
                assert_eq!(name, "second");
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected FieldIo, got {:?}", other),
        }

        let mut sink = ShortSink {
            data: Vec::new(),
            limit: 5,
        };
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_text_part("only", "x").unwrap();
        assert!(matches!(
            form.write_to(&mut sink).await,
            Err(Error::FieldIo { ref name, .. }) if name == "only"
        ));
    }

    #[tokio::test]
    async fn test_closing_boundary_failure_after_file_names_the_file_part() {
        let mut form = FormBuilder::with_boundary("B").unwrap();
        form.add_file_part("upload", "u.bin", Cursor::new(b"abc".to_vec()))
            .unwrap();
        // Everything but the closing boundary fits.
        let length_without_closing = concat!(
            "--B\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"u.bin\"\r\n",
            "Content-Type: application/octet-stream\r\nContent-Transfer-Encoding: binary\r\n\r\n",
            "abc"
        )
        .len();

        let mut sink = ShortSink {
            data: Vec::new(),
            limit: length_without_closing,
        };
        assert!(matches!(
            form.write_to(&mut sink).await,
            Err(Error::FieldIo { ref name, .. }) if name == "upload"
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rejected_append_is_logged() {
        let mut form = FormBuilder::new();
        form.finalize();
        assert!(form.add_text_part("late", "x").is_err());
        assert!(logs_contain("append rejected: form is finalized"));
        assert!(logs_contain("late"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_write_is_logged() {
        let mut form = FormBuilder::new();
        form.add_text_part("a", "b").unwrap();
        let mut output = Vec::new();
        form.write_to(&mut output).await.unwrap();
        assert!(logs_contain("writing form body"));
        assert!(logs_contain("finished writing form body"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_part_is_logged() {
        let mut form = FormBuilder::new();
        form.add_file_part("upload", "broken.bin", FailingReader { data: None })
            .unwrap();
        let mut output = Vec::new();
        assert!(form.write_to(&mut output).await.is_err());
        assert!(logs_contain("failed to stream part"));
        assert!(logs_contain("device lost"));
    }
}
