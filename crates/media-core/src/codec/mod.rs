//! Codec descriptors, attributes and the codec seam.

mod g711;
mod lpcm;
mod manager;

pub use g711::{G711Codec, G711Variant};
pub use lpcm::LpcmCodec;
pub use manager::CodecManager;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine tick period; every frame duration is a multiple of this.
pub const FRAME_TIME_BASE_MS: u16 = 10;

/// Codec name of linear 16-bit PCM.
pub const LPCM_CODEC_NAME: &str = "L16";

/// Dynamic payload type used for linear PCM.
pub const LPCM_PAYLOAD_TYPE: u8 = 96;

/// Negotiated parameters of one media flow direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    /// RTP payload type
    pub payload_type: u8,
    /// Codec name as used in SDP (`PCMU`, `PCMA`, `L16`, …)
    pub name: String,
    /// Sampling rate in Hz
    pub sampling_rate: u32,
    /// Number of interleaved channels
    pub channel_count: u8,
    /// Frame duration in milliseconds
    pub frame_duration_ms: u16,
}

impl CodecDescriptor {
    /// Descriptor with a 20 ms default frame duration.
    pub fn new(payload_type: u8, name: impl Into<String>, sampling_rate: u32) -> Self {
        Self {
            payload_type,
            name: name.into(),
            sampling_rate,
            channel_count: 1,
            frame_duration_ms: 20,
        }
    }

    /// PCMU/8000 descriptor.
    pub fn pcmu() -> Self {
        Self::new(0, "PCMU", 8000)
    }

    /// PCMA/8000 descriptor.
    pub fn pcma() -> Self {
        Self::new(8, "PCMA", 8000)
    }

    /// Linear PCM descriptor at the given rate.
    pub fn lpcm(sampling_rate: u32) -> Self {
        Self::new(LPCM_PAYLOAD_TYPE, LPCM_CODEC_NAME, sampling_rate)
    }

    /// Byte-for-byte equality as the null-bridge predicate: payload
    /// type, name, rate, channels and frame duration all match.
    pub fn matches(&self, other: &CodecDescriptor) -> bool {
        self.payload_type == other.payload_type
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.sampling_rate == other.sampling_rate
            && self.channel_count == other.channel_count
            && self.frame_duration_ms == other.frame_duration_ms
    }

    /// True for linear PCM.
    pub fn is_lpcm(&self) -> bool {
        self.name.eq_ignore_ascii_case(LPCM_CODEC_NAME)
    }

    /// The linear equivalent of this descriptor (same rate/channels).
    pub fn to_lpcm(&self) -> CodecDescriptor {
        CodecDescriptor {
            payload_type: LPCM_PAYLOAD_TYPE,
            name: LPCM_CODEC_NAME.to_string(),
            sampling_rate: self.sampling_rate,
            channel_count: self.channel_count,
            frame_duration_ms: self.frame_duration_ms,
        }
    }

    /// Size in bytes of one linear PCM frame with these parameters.
    pub fn linear_frame_size(&self) -> usize {
        linear_frame_size(
            self.sampling_rate,
            self.channel_count,
            self.frame_duration_ms,
        )
    }
}

impl fmt::Display for CodecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}ms",
            self.name, self.sampling_rate, self.channel_count, self.frame_duration_ms
        )
    }
}

/// Bytes of one linear PCM (16-bit) frame.
pub fn linear_frame_size(sampling_rate: u32, channel_count: u8, frame_duration_ms: u16) -> usize {
    (sampling_rate as usize / 1000) * frame_duration_ms as usize * channel_count as usize * 2
}

/// Bytes of one encoded frame for a codec with the given bits per sample.
pub fn frame_size(
    sampling_rate: u32,
    channel_count: u8,
    frame_duration_ms: u16,
    bits_per_sample: u16,
) -> usize {
    (sampling_rate as usize / 1000)
        * frame_duration_ms as usize
        * channel_count as usize
        * bits_per_sample as usize
        / 8
}

/// Static properties of a codec implementation.
#[derive(Debug, Clone)]
pub struct CodecAttributes {
    /// Codec name
    pub name: &'static str,
    /// Bits per encoded sample
    pub bits_per_sample: u16,
    /// Native frame duration in milliseconds
    pub frame_duration_ms: u16,
}

/// One directional codec instance.
///
/// Codecs are frame-bounded: one call processes one frame and never
/// blocks, since they run on the media engine tick.
pub trait Codec: Send {
    /// Static codec properties.
    fn attribs(&self) -> &CodecAttributes;

    /// Encode one linear PCM frame.
    fn encode(&mut self, pcm: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Decode one encoded frame to linear PCM.
    fn decode(&mut self, encoded: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Fill `out` with one frame of encoded silence.
    fn fill_silence(&self, out: &mut Vec<u8>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_frame_size() {
        // 8 kHz mono, 20 ms, 16-bit => 320 bytes
        assert_eq!(linear_frame_size(8000, 1, 20), 320);
        // 16 kHz mono, 10 ms => 320 bytes
        assert_eq!(linear_frame_size(16000, 1, 10), 320);
        // 8 kHz stereo, 30 ms => 960 bytes
        assert_eq!(linear_frame_size(8000, 2, 30), 960);
    }

    #[test]
    fn test_descriptor_match_is_exact() {
        let a = CodecDescriptor::pcmu();
        let mut b = CodecDescriptor::pcmu();
        assert!(a.matches(&b));
        b.frame_duration_ms = 30;
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_lpcm_predicate() {
        assert!(CodecDescriptor::lpcm(8000).is_lpcm());
        assert!(!CodecDescriptor::pcmu().is_lpcm());
        let lin = CodecDescriptor::pcma().to_lpcm();
        assert_eq!(lin.name, "L16");
        assert_eq!(lin.sampling_rate, 8000);
    }
}
