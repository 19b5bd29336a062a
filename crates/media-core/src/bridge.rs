//! Bridge construction: the minimum adapter chain between two streams.
//!
//! Descriptors that match byte-for-byte get the null bridge, which moves
//! encoded frames untouched. Anything else goes through the linear path:
//! a decoder ahead of the bridge when the source codec is not linear, a
//! resampler when the rates differ, and an encoder behind the bridge
//! when the sink codec is not linear. The chain runs at the largest
//! native frame duration of the codecs involved, divided down to engine
//! ticks.

use tracing::{debug, info};

use crate::codec::{frame_size, Codec, CodecManager, FRAME_TIME_BASE_MS};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::frame::{FrameKind, MediaFrame};
use crate::object::MediaObject;
use crate::resampler::Resampler;
use crate::stream::{AudioStream, SharedStream, StreamHandle};

/// A directional source-to-sink connection.
pub struct Bridge {
    name: String,
    source: Box<dyn AudioStream>,
    sink: Box<dyn AudioStream>,
    /// Codec for encoded silence on the null path.
    silence_codec: Option<Box<dyn Codec>>,
    frame: MediaFrame,
    frame_duration_ms: u16,
    base_ticks: u8,
    cur_ticks: u8,
}

impl Bridge {
    /// True when the null path was selected.
    pub fn is_null(&self) -> bool {
        self.silence_codec.is_some()
    }

    /// Frame duration of the composed chain.
    pub fn frame_duration_ms(&self) -> u16 {
        self.frame_duration_ms
    }

    fn ticks_due(&mut self) -> bool {
        if self.base_ticks > 1 {
            self.cur_ticks += 1;
            if self.cur_ticks < self.base_ticks {
                return false;
            }
            self.cur_ticks = 0;
        }
        true
    }
}

impl MediaObject for Bridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self) -> Result<()> {
        if !self.ticks_due() {
            return Ok(());
        }
        self.frame.clear();
        self.source.read_frame(&mut self.frame)?;

        if !self.frame.kind.contains(FrameKind::AUDIO) {
            // Nothing was produced; feed silence downstream.
            match &self.silence_codec {
                Some(codec) => codec.fill_silence(&mut self.frame.audio),
                None => self.frame.fill_silence(),
            }
        }

        self.sink.write_frame(&self.frame)
    }

    fn trace(&self) {
        info!(
            "Media Path {} {}->Bridge->{}",
            self.name,
            self.source.trace_label(),
            self.sink.trace_label()
        );
    }

    fn destroy(&mut self) {
        debug!("Destroy audio bridge {}", self.name);
        self.source.rx_close();
        self.sink.tx_close();
    }
}

/// Build the connection between a source and a sink termination stream.
pub fn create_bridge(
    source_handle: StreamHandle,
    sink_handle: StreamHandle,
    codec_manager: &CodecManager,
    name: &str,
) -> Result<Bridge> {
    let mut source: Box<dyn AudioStream> = Box::new(SharedStream::new(source_handle));
    let mut sink: Box<dyn AudioStream> = Box::new(SharedStream::new(sink_handle));

    // Cross-validate: each side's fixed descriptor is the other's offer.
    let sink_tx = sink.tx_descriptor();
    if !source.rx_validate(sink_tx.as_ref(), None) {
        return Err(Error::CapabilityMismatch(format!(
            "{name}: source cannot receive"
        )));
    }
    let source_rx = source.rx_descriptor();
    if !sink.tx_validate(source_rx.as_ref(), None) {
        return Err(Error::CapabilityMismatch(format!(
            "{name}: sink cannot send"
        )));
    }

    let rx = source
        .rx_descriptor()
        .ok_or_else(|| Error::CapabilityMismatch(format!("{name}: no rx descriptor")))?;
    let tx = sink
        .tx_descriptor()
        .ok_or_else(|| Error::CapabilityMismatch(format!("{name}: no tx descriptor")))?;

    if rx.matches(&tx) {
        return create_null_bridge(source, sink, codec_manager, name, rx);
    }

    // Linear path: decoder, resampler and encoder only where needed.
    let mut frame_duration = FRAME_TIME_BASE_MS;
    let mut source_codec = None;
    if !rx.is_lpcm() {
        let codec = codec_manager.codec_for(&rx)?;
        frame_duration = frame_duration.max(codec.attribs().frame_duration_ms);
        source_codec = Some(codec);
    }
    let mut sink_codec = None;
    if !tx.is_lpcm() {
        let codec = codec_manager.codec_for(&tx)?;
        frame_duration = frame_duration.max(codec.attribs().frame_duration_ms);
        sink_codec = Some(codec);
    }

    if let Some(codec) = source_codec {
        source = Box::new(Decoder::new(source, codec, frame_duration)?);
    }
    if let Some(codec) = sink_codec {
        sink = Box::new(Encoder::new(sink, codec, frame_duration)?);
    }

    let source_rate = source
        .rx_descriptor()
        .map(|d| d.sampling_rate)
        .unwrap_or_default();
    let sink_rate = sink
        .tx_descriptor()
        .map(|d| d.sampling_rate)
        .unwrap_or_default();
    if source_rate != sink_rate {
        source = Box::new(Resampler::new(source, sink_rate, frame_duration)?);
    }

    debug!("Create linear audio bridge {} ({}ms)", name, frame_duration);
    let descriptor = source
        .rx_descriptor()
        .ok_or_else(|| Error::CapabilityMismatch(format!("{name}: chain unbound")))?;
    let size = crate::codec::linear_frame_size(
        descriptor.sampling_rate,
        descriptor.channel_count,
        frame_duration,
    );

    source.rx_open(None)?;
    if let Err(e) = sink.tx_open(None) {
        source.rx_close();
        return Err(e);
    }

    Ok(Bridge {
        name: name.to_string(),
        source,
        sink,
        silence_codec: None,
        frame: MediaFrame::with_size(size),
        frame_duration_ms: frame_duration,
        base_ticks: (frame_duration / FRAME_TIME_BASE_MS) as u8,
        cur_ticks: 0,
    })
}

fn create_null_bridge(
    mut source: Box<dyn AudioStream>,
    mut sink: Box<dyn AudioStream>,
    codec_manager: &CodecManager,
    name: &str,
    descriptor: crate::codec::CodecDescriptor,
) -> Result<Bridge> {
    debug!("Create null audio bridge {}", name);
    let codec = codec_manager.codec_for(&descriptor)?;
    let frame_duration = codec.attribs().frame_duration_ms;
    let size = frame_size(
        descriptor.sampling_rate,
        descriptor.channel_count,
        frame_duration,
        codec.attribs().bits_per_sample,
    );

    source.rx_open(Some(&descriptor))?;
    if let Err(e) = sink.tx_open(Some(&descriptor)) {
        source.rx_close();
        return Err(e);
    }

    Ok(Bridge {
        name: name.to_string(),
        source,
        sink,
        silence_codec: Some(codec),
        frame: MediaFrame::with_size(size),
        frame_duration_ms: frame_duration,
        base_ticks: (frame_duration / FRAME_TIME_BASE_MS) as u8,
        cur_ticks: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecDescriptor;
    use crate::stream::{
        shared, CodecCapability, StreamBase, StreamCapabilities, StreamDirection,
    };

    /// Test stream producing a fixed byte pattern each tick.
    struct PatternSource {
        base: StreamBase,
        pattern: u8,
        reads: usize,
    }

    impl PatternSource {
        fn new(descriptor: CodecDescriptor, pattern: u8) -> Self {
            let mut base = StreamBase::new(StreamCapabilities::new(
                StreamDirection::Receive,
                CodecCapability::new(descriptor.name.clone(), vec![descriptor.sampling_rate]),
            ));
            base.rx_descriptor = Some(descriptor);
            Self {
                base,
                pattern,
                reads: 0,
            }
        }
    }

    impl AudioStream for PatternSource {
        fn direction(&self) -> StreamDirection {
            self.base.capabilities.direction
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
            self.reads += 1;
            frame.audio.fill(self.pattern);
            frame.kind.insert(FrameKind::AUDIO);
            Ok(())
        }
    }

    /// Test stream recording everything written to it.
    struct CaptureSink {
        base: StreamBase,
        frames: std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
    }

    impl CaptureSink {
        fn new(descriptor: CodecDescriptor) -> Self {
            let mut base = StreamBase::new(StreamCapabilities::new(
                StreamDirection::Send,
                CodecCapability::new(descriptor.name.clone(), vec![descriptor.sampling_rate]),
            ));
            base.tx_descriptor = Some(descriptor);
            Self {
                base,
                frames: Default::default(),
            }
        }

        fn captured(&self) -> std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>> {
            self.frames.clone()
        }
    }

    impl AudioStream for CaptureSink {
        fn direction(&self) -> StreamDirection {
            self.base.capabilities.direction
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
            self.frames.lock().unwrap().push(frame.audio.clone());
            Ok(())
        }
    }

    #[test]
    fn test_matching_descriptors_select_null_bridge() {
        let manager = CodecManager::new();
        let descriptor = CodecDescriptor::pcmu();
        let source = shared(PatternSource::new(descriptor.clone(), 0xAB));
        let sink = shared(CaptureSink::new(descriptor));

        let bridge = create_bridge(source, sink, &manager, "t1->t2").unwrap();
        assert!(bridge.is_null());
        assert_eq!(bridge.frame_duration_ms(), 20);
    }

    #[test]
    fn test_frame_duration_mismatch_selects_linear_bridge() {
        let manager = CodecManager::new();
        let source = shared(PatternSource::new(CodecDescriptor::pcmu(), 0x11));
        let mut sink_descriptor = CodecDescriptor::pcmu();
        sink_descriptor.frame_duration_ms = 30;
        let sink = shared(CaptureSink::new(sink_descriptor));

        let bridge = create_bridge(source, sink, &manager, "t1->t2").unwrap();
        assert!(!bridge.is_null());
        // Chain runs at the larger native frame duration.
        assert_eq!(bridge.frame_duration_ms(), 30);
    }

    #[test]
    fn test_null_bridge_moves_frames_and_respects_ticks() {
        let manager = CodecManager::new();
        let descriptor = CodecDescriptor::pcmu();
        let source = shared(PatternSource::new(descriptor.clone(), 0x42));
        let sink = CaptureSink::new(descriptor);
        let captured = sink.captured();
        let mut bridge = create_bridge(source, shared(sink), &manager, "move").unwrap();

        // 20 ms frames on a 10 ms tick: every second tick moves a frame.
        for _ in 0..4 {
            bridge.process().unwrap();
        }
        let frames = captured.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 160);
        assert!(frames[0].iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_transcoding_bridge_pcmu_to_pcma() {
        let manager = CodecManager::new();
        let source = shared(PatternSource::new(CodecDescriptor::pcmu(), 0xFF));
        let sink = shared(CaptureSink::new(CodecDescriptor::pcma()));

        let mut bridge = create_bridge(source, sink, &manager, "xcode").unwrap();
        assert!(!bridge.is_null());
        bridge.process().unwrap();
        bridge.process().unwrap();
    }

    #[test]
    fn test_rate_mismatch_inserts_resampler() {
        let manager = CodecManager::new();
        let mut src_descriptor = CodecDescriptor::lpcm(16000);
        src_descriptor.frame_duration_ms = 20;
        let mut snk_descriptor = CodecDescriptor::lpcm(8000);
        snk_descriptor.frame_duration_ms = 20;
        let source = shared(PatternSource::new(src_descriptor, 0x01));
        let sink = shared(CaptureSink::new(snk_descriptor));

        let bridge = create_bridge(source, sink, &manager, "rates").unwrap();
        assert!(!bridge.is_null());
        assert_eq!(bridge.frame_duration_ms(), FRAME_TIME_BASE_MS);
    }

    #[test]
    fn test_incompatible_codecs_fail() {
        let manager = CodecManager::new();
        let source = shared(PatternSource::new(
            CodecDescriptor::new(9, "G722", 16000),
            0,
        ));
        let sink = shared(CaptureSink::new(CodecDescriptor::pcmu()));
        assert!(create_bridge(source, sink, &manager, "bad").is_err());
    }
}
