//! Sample-rate adapter between two linear streams.
//!
//! Nearest-sample mapping, good enough for LPCM framing; DSP-grade
//! interpolation is out of scope.

use crate::codec::CodecDescriptor;
use crate::error::{Error, Result};
use crate::frame::{FrameKind, MediaFrame};
use crate::stream::{AudioStream, StreamDirection};

/// Wraps a linear receive stream, converting its rate to the sink rate.
pub struct Resampler {
    inner: Box<dyn AudioStream>,
    descriptor: CodecDescriptor,
    source_rate: u32,
    scratch: MediaFrame,
}

impl Resampler {
    /// Adapter converting `inner` to `target_rate`, sized for the
    /// composed chain's frame duration.
    pub fn new(
        inner: Box<dyn AudioStream>,
        target_rate: u32,
        frame_duration_ms: u16,
    ) -> Result<Self> {
        let source = inner
            .rx_descriptor()
            .ok_or_else(|| Error::Stream("resampler source unbound".into()))?;
        if !source.is_lpcm() {
            return Err(Error::Stream("resampler requires linear input".into()));
        }
        let mut descriptor = source.clone();
        descriptor.sampling_rate = target_rate;
        descriptor.frame_duration_ms = frame_duration_ms;
        let scratch_size = crate::codec::linear_frame_size(
            source.sampling_rate,
            source.channel_count,
            frame_duration_ms,
        );
        Ok(Self {
            scratch: MediaFrame::with_size(scratch_size),
            source_rate: source.sampling_rate,
            inner,
            descriptor,
        })
    }
}

impl AudioStream for Resampler {
    fn direction(&self) -> StreamDirection {
        self.inner.direction()
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        Some(self.descriptor.clone())
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
            resample_16bit(
                &self.scratch.audio,
                self.source_rate,
                &mut frame.audio,
                self.descriptor.sampling_rate,
                self.descriptor.channel_count,
            );
        }
        Ok(())
    }

    fn trace_label(&self) -> String {
        format!(
            "Resampler({}->{})",
            self.source_rate, self.descriptor.sampling_rate
        )
    }
}

fn resample_16bit(input: &[u8], in_rate: u32, output: &mut [u8], out_rate: u32, channels: u8) {
    let channels = channels.max(1) as usize;
    let in_samples = input.len() / 2 / channels;
    let out_samples = output.len() / 2 / channels;
    if in_samples == 0 || out_samples == 0 {
        output.fill(0);
        return;
    }
    debug_assert_eq!(
        in_samples as u64 * out_rate as u64 / in_rate.max(1) as u64,
        out_samples as u64
    );
    for i in 0..out_samples {
        let src = (i as u64 * in_rate as u64 / out_rate as u64) as usize;
        let src = src.min(in_samples - 1);
        for c in 0..channels {
            let in_off = (src * channels + c) * 2;
            let out_off = (i * channels + c) * 2;
            output[out_off] = input[in_off];
            output[out_off + 1] = input[in_off + 1];
        }
    }
}
