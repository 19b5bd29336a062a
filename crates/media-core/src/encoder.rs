//! Encoder adapter: presents a linear sink over an encoded send stream.

use crate::codec::{Codec, CodecDescriptor};
use crate::error::Result;
use crate::frame::{FrameKind, MediaFrame};
use crate::stream::{AudioStream, StreamDirection};

/// Wraps a send stream whose descriptor is not linear; every frame
/// written is encoded before it reaches the wrapped stream.
pub struct Encoder {
    inner: Box<dyn AudioStream>,
    codec: Box<dyn Codec>,
    lpcm_descriptor: CodecDescriptor,
    scratch: MediaFrame,
}

impl Encoder {
    /// Adapter over `inner`, encoding with `codec`.
    pub fn new(
        inner: Box<dyn AudioStream>,
        codec: Box<dyn Codec>,
        frame_duration_ms: u16,
    ) -> Result<Self> {
        let mut encoded = inner
            .tx_descriptor()
            .ok_or_else(|| crate::error::Error::Stream("encoder sink unbound".into()))?;
        encoded.frame_duration_ms = frame_duration_ms;
        let mut lpcm_descriptor = encoded.to_lpcm();
        lpcm_descriptor.frame_duration_ms = frame_duration_ms;
        Ok(Self {
            inner,
            codec,
            lpcm_descriptor,
            scratch: MediaFrame::default(),
        })
    }
}

impl AudioStream for Encoder {
    fn direction(&self) -> StreamDirection {
        self.inner.direction()
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        self.inner.rx_descriptor()
    }

    fn tx_descriptor(&self) -> Option<CodecDescriptor> {
        Some(self.lpcm_descriptor.clone())
    }

    fn rx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.inner.rx_validate(offered, event)
    }

    fn tx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.inner.tx_validate(offered, event)
    }

    fn tx_open(&mut self, codec: Option<&CodecDescriptor>) -> Result<()> {
        self.inner.tx_open(codec)
    }

    fn tx_close(&mut self) {
        self.inner.tx_close()
    }

    fn write_frame(&mut self, frame: &MediaFrame) -> Result<()> {
        self.scratch.clear();
        self.scratch.kind = frame.kind;
        self.scratch.marker = frame.marker;
        self.scratch.event = frame.event;
        if frame.kind.contains(FrameKind::AUDIO) {
            self.codec.encode(&frame.audio, &mut self.scratch.audio)?;
        }
        self.inner.write_frame(&self.scratch)
    }

    fn trace_label(&self) -> String {
        format!("Encoder({})", self.inner.trace_label())
    }
}
