//! Shared audio buffer between producer threads and the engine tick.
//!
//! The one lock in the media path: producers (a synthesiser plugin, a
//! test feeder) push whole frames, the engine pops one per tick. Lock
//! scope is a single push or pop.

use std::sync::{Arc, Mutex};

use tracing::trace;

use rspeech_infra_common::CyclicQueue;

use crate::codec::CodecDescriptor;
use crate::error::Result;
use crate::frame::{FrameKind, MediaFrame};
use crate::stream::{
    AudioStream, CodecCapability, StreamBase, StreamCapabilities, StreamDirection,
};

/// Bounded frame queue with a mutex around each operation.
pub struct AudioBuffer {
    queue: Mutex<CyclicQueue<MediaFrame>>,
}

impl AudioBuffer {
    /// Buffer holding up to `capacity` frames.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(CyclicQueue::new(capacity)),
        })
    }

    /// Queue a frame; the frame comes back when the buffer is full.
    pub fn push(&self, frame: MediaFrame) -> std::result::Result<(), MediaFrame> {
        self.queue.lock().expect("audio buffer lock").push(frame)
    }

    /// Take the oldest frame.
    pub fn pop(&self) -> Option<MediaFrame> {
        self.queue.lock().expect("audio buffer lock").pop()
    }

    /// True when no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().expect("audio buffer lock").is_empty()
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.queue.lock().expect("audio buffer lock").len()
    }
}

/// Receive stream popping frames from an [`AudioBuffer`].
pub struct BufferSource {
    base: StreamBase,
    buffer: Arc<AudioBuffer>,
}

impl BufferSource {
    /// Source with a fixed descriptor.
    pub fn new(buffer: Arc<AudioBuffer>, descriptor: CodecDescriptor) -> Self {
        let mut base = StreamBase::new(StreamCapabilities::new(
            StreamDirection::Receive,
            CodecCapability::new(descriptor.name.clone(), vec![descriptor.sampling_rate]),
        ));
        base.rx_descriptor = Some(descriptor);
        Self { base, buffer }
    }
}

impl AudioStream for BufferSource {
    fn direction(&self) -> StreamDirection {
        StreamDirection::Receive
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        self.base.rx_descriptor.clone()
    }

    fn tx_descriptor(&self) -> Option<CodecDescriptor> {
        None
    }

    fn rx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.base.rx_validate(offered, event)
    }

    fn tx_validate(
        &mut self,
        _offered: Option<&CodecDescriptor>,
        _event: Option<&CodecDescriptor>,
    ) -> bool {
        false
    }

    fn read_frame(&mut self, frame: &mut MediaFrame) -> Result<()> {
        if let Some(queued) = self.buffer.pop() {
            let len = usize::min(queued.audio.len(), frame.audio.len());
            frame.audio[..len].copy_from_slice(&queued.audio[..len]);
            frame.kind = queued.kind;
            frame.marker = queued.marker;
            frame.event = queued.event;
        }
        Ok(())
    }
}

/// Send stream pushing frames into an [`AudioBuffer`].
pub struct BufferSink {
    base: StreamBase,
    buffer: Arc<AudioBuffer>,
}

impl BufferSink {
    /// Sink with a fixed descriptor.
    pub fn new(buffer: Arc<AudioBuffer>, descriptor: CodecDescriptor) -> Self {
        let mut base = StreamBase::new(StreamCapabilities::new(
            StreamDirection::Send,
            CodecCapability::new(descriptor.name.clone(), vec![descriptor.sampling_rate]),
        ));
        base.tx_descriptor = Some(descriptor);
        Self { base, buffer }
    }
}

impl AudioStream for BufferSink {
    fn direction(&self) -> StreamDirection {
        StreamDirection::Send
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        None
    }

    fn tx_descriptor(&self) -> Option<CodecDescriptor> {
        self.base.tx_descriptor.clone()
    }

    fn rx_validate(
        &mut self,
        _offered: Option<&CodecDescriptor>,
        _event: Option<&CodecDescriptor>,
    ) -> bool {
        false
    }

    fn tx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.base.tx_validate(offered, event)
    }

    fn write_frame(&mut self, frame: &MediaFrame) -> Result<()> {
        if frame.kind.contains(FrameKind::AUDIO) || frame.kind.contains(FrameKind::EVENT) {
            let mut copy = MediaFrame::with_size(frame.audio.len());
            copy.audio.copy_from_slice(&frame.audio);
            copy.kind = frame.kind;
            copy.marker = frame.marker;
            copy.event = frame.event;
            if self.buffer.push(copy).is_err() {
                trace!("audio buffer full, frame dropped");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_through_buffer() {
        let buffer = AudioBuffer::new(4);
        assert!(buffer.is_empty());

        let mut frame = MediaFrame::with_size(8);
        frame.kind.insert(FrameKind::AUDIO);
        frame.audio.fill(7);
        buffer.push(frame).unwrap();
        assert_eq!(buffer.len(), 1);

        let out = buffer.pop().unwrap();
        assert!(out.kind.contains(FrameKind::AUDIO));
        assert!(out.audio.iter().all(|&b| b == 7));
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn test_full_buffer_rejects_push() {
        let buffer = AudioBuffer::new(1);
        buffer.push(MediaFrame::with_size(1)).unwrap();
        assert!(buffer.push(MediaFrame::with_size(1)).is_err());
    }

    #[test]
    fn test_source_and_sink_streams() {
        let descriptor = CodecDescriptor::lpcm(8000);
        let shared_buffer = AudioBuffer::new(8);
        let mut sink = BufferSink::new(shared_buffer.clone(), descriptor.clone());
        let mut source = BufferSource::new(shared_buffer, descriptor.clone());

        let mut frame = MediaFrame::with_size(descriptor.linear_frame_size());
        frame.kind.insert(FrameKind::AUDIO);
        frame.audio.fill(0x55);
        sink.write_frame(&frame).unwrap();

        let mut out = MediaFrame::with_size(descriptor.linear_frame_size());
        source.read_frame(&mut out).unwrap();
        assert!(out.kind.contains(FrameKind::AUDIO));
        assert!(out.audio.iter().all(|&b| b == 0x55));

        // Next tick has nothing queued.
        let mut empty = MediaFrame::with_size(descriptor.linear_frame_size());
        source.read_frame(&mut empty).unwrap();
        assert!(empty.kind.is_none());
    }
}
