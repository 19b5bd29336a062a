//! Decoder adapter: presents an encoded source stream as linear PCM.

use crate::codec::{frame_size, Codec, CodecDescriptor};
use crate::error::Result;
use crate::frame::{FrameKind, MediaFrame};
use crate::stream::{AudioStream, StreamDirection};

/// Wraps a receive stream whose descriptor is not linear; every frame
/// read is decoded before it reaches the bridge.
pub struct Decoder {
    inner: Box<dyn AudioStream>,
    codec: Box<dyn Codec>,
    lpcm_descriptor: CodecDescriptor,
    scratch: MediaFrame,
}

impl Decoder {
    /// Adapter over `inner`, decoding with `codec`.
    pub fn new(
        inner: Box<dyn AudioStream>,
        codec: Box<dyn Codec>,
        frame_duration_ms: u16,
    ) -> Result<Self> {
        let mut encoded = inner
            .rx_descriptor()
            .ok_or_else(|| crate::error::Error::Stream("decoder source unbound".into()))?;
        encoded.frame_duration_ms = frame_duration_ms;
        let mut lpcm_descriptor = encoded.to_lpcm();
        lpcm_descriptor.frame_duration_ms = frame_duration_ms;
        let encoded_size = frame_size(
            encoded.sampling_rate,
            encoded.channel_count,
            frame_duration_ms,
            codec.attribs().bits_per_sample,
        );
        Ok(Self {
            inner,
            codec,
            lpcm_descriptor,
            scratch: MediaFrame::with_size(encoded_size),
        })
    }
}

impl AudioStream for Decoder {
    fn direction(&self) -> StreamDirection {
        self.inner.direction()
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        Some(self.lpcm_descriptor.clone())
    }

    fn tx_descriptor(&self) -> Option<CodecDescriptor> {
        self.inner.tx_descriptor()
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

    fn rx_open(&mut self, codec: Option<&CodecDescriptor>) -> Result<()> {
        self.inner.rx_open(codec)
    }

    fn rx_close(&mut self) {
        self.inner.rx_close()
    }

    fn read_frame(&mut self, frame: &mut MediaFrame) -> Result<()> {
        self.scratch.clear();
        self.inner.read_frame(&mut self.scratch)?;
        frame.kind = self.scratch.kind;
        frame.marker = self.scratch.marker;
        frame.event = self.scratch.event;
        if self.scratch.kind.contains(FrameKind::AUDIO) {
            self.codec.decode(&self.scratch.audio, &mut frame.audio)?;
        }
        Ok(())
    }

    fn trace_label(&self) -> String {
        format!("Decoder({})", self.inner.trace_label())
    }
}
