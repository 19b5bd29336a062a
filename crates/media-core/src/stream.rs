//! Audio stream abstraction.
//!
//! A stream is one endpoint's media interface: a declared direction, a
//! codec capability set, and the negotiated rx/tx descriptors fixed on
//! the first successful validation. Streams run on the media engine
//! tick, so frame calls must be frame-bounded and never block.

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::codec::CodecDescriptor;
use crate::error::Result;
use crate::frame::MediaFrame;

/// Direction a stream supports, from the endpoint's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamDirection {
    /// Inactive
    #[default]
    None,
    /// The stream produces frames (it can be read)
    Receive,
    /// The stream consumes frames (it can be written)
    Send,
    /// Both
    SendReceive,
}

impl StreamDirection {
    /// True when frames can be read from the stream.
    pub fn can_receive(&self) -> bool {
        matches!(self, StreamDirection::Receive | StreamDirection::SendReceive)
    }

    /// True when frames can be written to the stream.
    pub fn can_send(&self) -> bool {
        matches!(self, StreamDirection::Send | StreamDirection::SendReceive)
    }

    /// Union of two directions.
    pub fn merge(&self, other: StreamDirection) -> StreamDirection {
        match (self.can_receive() || other.can_receive(), self.can_send() || other.can_send()) {
            (true, true) => StreamDirection::SendReceive,
            (true, false) => StreamDirection::Receive,
            (false, true) => StreamDirection::Send,
            (false, false) => StreamDirection::None,
        }
    }
}

/// One entry of a stream's codec capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    /// Codec name
    pub name: String,
    /// Supported sampling rates
    pub sampling_rates: Vec<u32>,
}

impl CodecCapability {
    /// Capability for one codec at the given rates.
    pub fn new(name: impl Into<String>, sampling_rates: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            sampling_rates,
        }
    }

    fn admits(&self, descriptor: &CodecDescriptor) -> bool {
        self.name.eq_ignore_ascii_case(&descriptor.name)
            && self.sampling_rates.contains(&descriptor.sampling_rate)
    }
}

/// Declared capabilities of a stream.
#[derive(Debug, Clone, Default)]
pub struct StreamCapabilities {
    /// Supported direction
    pub direction: StreamDirection,
    /// Codec capability set, in preference order
    pub codecs: Vec<CodecCapability>,
    /// Whether named events (RFC 4733) are supported
    pub named_events: bool,
}

impl StreamCapabilities {
    /// Capability set with one codec entry.
    pub fn new(direction: StreamDirection, codec: CodecCapability) -> Self {
        Self {
            direction,
            codecs: vec![codec],
            named_events: false,
        }
    }

    /// Intersect with an offered descriptor; `None` when the offer is
    /// outside the capability set.
    fn intersect(&self, offered: Option<&CodecDescriptor>) -> Option<CodecDescriptor> {
        match offered {
            Some(descriptor) => self
                .codecs
                .iter()
                .any(|c| c.admits(descriptor))
                .then(|| descriptor.clone()),
            // No constraint from the peer: pick the preferred codec.
            None => self.codecs.first().map(|c| {
                let rate = c.sampling_rates.first().copied().unwrap_or(8000);
                default_descriptor(&c.name, rate)
            }),
        }
    }
}

fn default_descriptor(name: &str, rate: u32) -> CodecDescriptor {
    let payload_type = match name.to_ascii_uppercase().as_str() {
        "PCMU" => 0,
        "PCMA" => 8,
        _ => crate::codec::LPCM_PAYLOAD_TYPE,
    };
    CodecDescriptor::new(payload_type, name.to_ascii_uppercase(), rate)
}

/// Negotiation state every stream embeds.
#[derive(Debug, Default)]
pub struct StreamBase {
    /// Declared capabilities
    pub capabilities: StreamCapabilities,
    /// Fixed receive-side descriptor
    pub rx_descriptor: Option<CodecDescriptor>,
    /// Fixed receive-side event descriptor
    pub rx_event_descriptor: Option<CodecDescriptor>,
    /// Fixed send-side descriptor
    pub tx_descriptor: Option<CodecDescriptor>,
    /// Fixed send-side event descriptor
    pub tx_event_descriptor: Option<CodecDescriptor>,
}

impl StreamBase {
    /// Base with the given capabilities.
    pub fn new(capabilities: StreamCapabilities) -> Self {
        Self {
            capabilities,
            ..Default::default()
        }
    }

    /// Validate the receive side against an offer, fixing the rx
    /// descriptor on the first success.
    pub fn rx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        if self.rx_descriptor.is_none() {
            self.rx_descriptor = self.capabilities.intersect(offered);
        }
        if self.rx_event_descriptor.is_none() && self.capabilities.named_events {
            self.rx_event_descriptor = event.cloned();
        }
        self.rx_descriptor.is_some()
    }

    /// Validate the send side against an offer, fixing the tx
    /// descriptor on the first success.
    pub fn tx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        if self.tx_descriptor.is_none() {
            self.tx_descriptor = self.capabilities.intersect(offered);
        }
        if self.tx_event_descriptor.is_none() && self.capabilities.named_events {
            self.tx_event_descriptor = event.cloned();
        }
        self.tx_descriptor.is_some()
    }
}

/// The rx/tx contract every media endpoint satisfies.
///
/// Defaulted methods mirror optional vtable slots: a send-only stream
/// keeps the default `read_frame`, a receive-only stream the default
/// `write_frame`.
pub trait AudioStream: Send {
    /// Declared direction.
    fn direction(&self) -> StreamDirection;

    /// Negotiated receive descriptor, when fixed.
    fn rx_descriptor(&self) -> Option<CodecDescriptor>;

    /// Negotiated send descriptor, when fixed.
    fn tx_descriptor(&self) -> Option<CodecDescriptor>;

    /// Intersect the receive side with an offer.
    fn rx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool;

    /// Intersect the send side with an offer.
    fn tx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool;

    /// Open the receive side; `codec` is set for null-bridge paths.
    fn rx_open(&mut self, _codec: Option<&CodecDescriptor>) -> Result<()> {
        Ok(())
    }

    /// Close the receive side.
    fn rx_close(&mut self) {}

    /// Open the send side.
    fn tx_open(&mut self, _codec: Option<&CodecDescriptor>) -> Result<()> {
        Ok(())
    }

    /// Close the send side.
    fn tx_close(&mut self) {}

    /// Fill the frame with one tick of media (receive side).
    fn read_frame(&mut self, _frame: &mut MediaFrame) -> Result<()> {
        Ok(())
    }

    /// Consume one tick of media (send side).
    fn write_frame(&mut self, _frame: &MediaFrame) -> Result<()> {
        Ok(())
    }

    /// Short description for media-path traces.
    fn trace_label(&self) -> String {
        match (self.rx_descriptor(), self.tx_descriptor()) {
            (Some(rx), _) => rx.to_string(),
            (None, Some(tx)) => tx.to_string(),
            (None, None) => "unbound".to_string(),
        }
    }
}

/// Shared handle to a stream owned by a termination.
///
/// Terminations and the topology objects built over them both touch the
/// same stream; the handle serialises access, one frame call per lock.
pub type StreamHandle = Arc<Mutex<dyn AudioStream>>;

/// Wrap a stream into a shared handle.
pub fn shared(stream: impl AudioStream + 'static) -> StreamHandle {
    Arc::new(Mutex::new(stream))
}

/// [`AudioStream`] view over a [`StreamHandle`], so adapter chains can
/// treat shared and owned streams alike.
pub struct SharedStream {
    inner: StreamHandle,
}

impl SharedStream {
    /// View over the handle.
    pub fn new(inner: StreamHandle) -> Self {
        Self { inner }
    }
}

impl AudioStream for SharedStream {
    fn direction(&self) -> StreamDirection {
        self.inner.lock().expect("stream lock").direction()
    }

    fn rx_descriptor(&self) -> Option<CodecDescriptor> {
        self.inner.lock().expect("stream lock").rx_descriptor()
    }

    fn tx_descriptor(&self) -> Option<CodecDescriptor> {
        self.inner.lock().expect("stream lock").tx_descriptor()
    }

    fn rx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.inner
            .lock()
            .expect("stream lock")
            .rx_validate(offered, event)
    }

    fn tx_validate(
        &mut self,
        offered: Option<&CodecDescriptor>,
        event: Option<&CodecDescriptor>,
    ) -> bool {
        self.inner
            .lock()
            .expect("stream lock")
            .tx_validate(offered, event)
    }

    fn rx_open(&mut self, codec: Option<&CodecDescriptor>) -> Result<()> {
        trace!("rx open");
        self.inner.lock().expect("stream lock").rx_open(codec)
    }

    fn rx_close(&mut self) {
        self.inner.lock().expect("stream lock").rx_close()
    }

    fn tx_open(&mut self, codec: Option<&CodecDescriptor>) -> Result<()> {
        trace!("tx open");
        self.inner.lock().expect("stream lock").tx_open(codec)
    }

    fn tx_close(&mut self) {
        self.inner.lock().expect("stream lock").tx_close()
    }

    fn read_frame(&mut self, frame: &mut MediaFrame) -> Result<()> {
        self.inner.lock().expect("stream lock").read_frame(frame)
    }

    fn write_frame(&mut self, frame: &MediaFrame) -> Result<()> {
        self.inner.lock().expect("stream lock").write_frame(frame)
    }

    fn trace_label(&self) -> String {
        self.inner.lock().expect("stream lock").trace_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcmu_caps(direction: StreamDirection) -> StreamCapabilities {
        StreamCapabilities::new(
            direction,
            CodecCapability::new("PCMU", vec![8000]),
        )
    }

    #[test]
    fn test_direction_predicates() {
        assert!(StreamDirection::Receive.can_receive());
        assert!(!StreamDirection::Receive.can_send());
        assert!(StreamDirection::SendReceive.can_send());
        assert_eq!(
            StreamDirection::Receive.merge(StreamDirection::Send),
            StreamDirection::SendReceive
        );
        assert_eq!(
            StreamDirection::None.merge(StreamDirection::None),
            StreamDirection::None
        );
    }

    #[test]
    fn test_rx_validate_fixes_descriptor_once() {
        let mut base = StreamBase::new(pcmu_caps(StreamDirection::Receive));
        let offered = CodecDescriptor::pcmu();
        assert!(base.rx_validate(Some(&offered), None));
        let fixed = base.rx_descriptor.clone().unwrap();

        // A different offer does not displace the fixed descriptor.
        let mut other = CodecDescriptor::pcmu();
        other.frame_duration_ms = 30;
        assert!(base.rx_validate(Some(&other), None));
        assert_eq!(base.rx_descriptor.unwrap(), fixed);
    }

    #[test]
    fn test_validate_rejects_unsupported_codec() {
        let mut base = StreamBase::new(pcmu_caps(StreamDirection::Send));
        let offered = CodecDescriptor::new(9, "G722", 16000);
        assert!(!base.tx_validate(Some(&offered), None));
        assert!(base.tx_descriptor.is_none());
    }

    #[test]
    fn test_validate_without_offer_picks_preference() {
        let mut base = StreamBase::new(pcmu_caps(StreamDirection::Receive));
        assert!(base.rx_validate(None, None));
        let fixed = base.rx_descriptor.unwrap();
        assert_eq!(fixed.name, "PCMU");
        assert_eq!(fixed.sampling_rate, 8000);
    }

    #[test]
    fn test_event_descriptor_gated_by_named_events() {
        let mut caps = pcmu_caps(StreamDirection::Receive);
        caps.named_events = true;
        let mut base = StreamBase::new(caps);
        let event = CodecDescriptor::new(101, "telephone-event", 8000);
        assert!(base.rx_validate(Some(&CodecDescriptor::pcmu()), Some(&event)));
        assert_eq!(base.rx_event_descriptor.unwrap().payload_type, 101);

        let mut no_events = StreamBase::new(pcmu_caps(StreamDirection::Receive));
        assert!(no_events.rx_validate(Some(&CodecDescriptor::pcmu()), Some(&event)));
        assert!(no_events.rx_event_descriptor.is_none());
    }
}
