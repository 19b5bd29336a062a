//! # rspeech-media-core
//!
//! The media-plane composition graph of the rspeech stack: codec
//! descriptors and adapters, the audio stream contract, contexts that
//! connect paired terminations through the minimum bridge chain, and
//! the frame-cadenced media engine driving it all.
//!
//! ## Topology rules
//!
//! When a context holds two terminations, one directional object is
//! created per ordered pair whose source stream can receive and sink
//! stream can send. Byte-identical descriptors get the null bridge;
//! otherwise a decoder is inserted before the bridge when the source
//! codec is not linear, a resampler when the rates differ, and an
//! encoder behind the bridge when the sink codec is not linear.
//!
//! ## Engine
//!
//! [`MediaEngine`] runs as a task from `rspeech-infra-common`, ticking
//! every 10 ms. Sessions submit [`EngineCommand`]s through a
//! [`MediaEngineHandle`]; commands are drained at the start of the next
//! tick and answered through the caller's response sink.

pub mod buffer;
pub mod bridge;
pub mod codec;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod file;
pub mod frame;
pub mod object;
pub mod resampler;
pub mod stream;
pub mod termination;
pub mod timer;

pub use buffer::{AudioBuffer, BufferSink, BufferSource};
pub use bridge::{create_bridge, Bridge};
pub use codec::{
    frame_size, linear_frame_size, Codec, CodecAttributes, CodecDescriptor, CodecManager,
    G711Codec, G711Variant, LpcmCodec, FRAME_TIME_BASE_MS, LPCM_CODEC_NAME, LPCM_PAYLOAD_TYPE,
};
pub use context::{ContextId, MediaContext, MAX_TERMINATION_COUNT};
pub use engine::{
    CommandKind, EngineCommand, EngineRequest, EngineResponse, EngineStatus, MediaEngine,
    MediaEngineHandle, ResponseSink,
};
pub use error::{Error, Result};
pub use file::{FileReaderStream, FileWriterStream};
pub use frame::{FrameKind, FrameMarker, MediaFrame, NamedEvent};
pub use object::MediaObject;
pub use stream::{
    shared, AudioStream, CodecCapability, SharedStream, StreamBase, StreamCapabilities,
    StreamDirection, StreamHandle,
};
pub use termination::{Termination, TerminationId};
pub use timer::{TimerId, TimerManager};
