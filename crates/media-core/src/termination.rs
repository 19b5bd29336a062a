//! Terminations: the endpoints a context connects.

use std::sync::Arc;

use crate::buffer::{AudioBuffer, BufferSink, BufferSource};
use crate::codec::CodecDescriptor;
use crate::error::Result;
use crate::file::{FileReaderStream, FileWriterStream};
use crate::stream::{shared, StreamDirection, StreamHandle};

/// Termination identifier, unique per engine.
pub type TerminationId = u64;

/// One endpoint on a media context: a named holder of an audio stream.
///
/// RTP endpoints and plugin-backed sources satisfy the same stream
/// contract; the constructors here cover the built-in kinds.
pub struct Termination {
    /// Identifier assigned by the creator
    pub id: TerminationId,
    /// Name for diagnostics
    pub name: String,
    stream: StreamHandle,
}

impl Termination {
    /// Termination over an externally built stream.
    pub fn new(id: TerminationId, name: impl Into<String>, stream: StreamHandle) -> Self {
        Self {
            id,
            name: name.into(),
            stream,
        }
    }

    /// Termination reading linear PCM from a file.
    pub fn file_reader(
        id: TerminationId,
        name: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        descriptor: CodecDescriptor,
    ) -> Result<Self> {
        let stream = FileReaderStream::open(path, descriptor)?;
        Ok(Self::new(id, name, shared(stream)))
    }

    /// Termination appending linear PCM to a file.
    pub fn file_writer(
        id: TerminationId,
        name: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        descriptor: CodecDescriptor,
    ) -> Result<Self> {
        let stream = FileWriterStream::create(path, descriptor)?;
        Ok(Self::new(id, name, shared(stream)))
    }

    /// Termination producing frames from a shared audio buffer.
    pub fn buffer_source(
        id: TerminationId,
        name: impl Into<String>,
        buffer: Arc<AudioBuffer>,
        descriptor: CodecDescriptor,
    ) -> Self {
        Self::new(id, name, shared(BufferSource::new(buffer, descriptor)))
    }

    /// Termination consuming frames into a shared audio buffer.
    pub fn buffer_sink(
        id: TerminationId,
        name: impl Into<String>,
        buffer: Arc<AudioBuffer>,
        descriptor: CodecDescriptor,
    ) -> Self {
        Self::new(id, name, shared(BufferSink::new(buffer, descriptor)))
    }

    /// Shared handle to the termination's stream.
    pub fn stream(&self) -> StreamHandle {
        self.stream.clone()
    }

    /// Declared direction of the stream.
    pub fn direction(&self) -> StreamDirection {
        self.stream.lock().expect("stream lock").direction()
    }
}
