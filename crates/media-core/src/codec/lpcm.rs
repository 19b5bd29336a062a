//! Linear 16-bit PCM passthrough codec.

use super::{Codec, CodecAttributes, CodecDescriptor};
use crate::error::Result;

/// L16 codec: encode and decode are byte copies.
#[derive(Debug)]
pub struct LpcmCodec {
    attribs: CodecAttributes,
}

impl LpcmCodec {
    /// Codec for the descriptor's frame duration.
    pub fn new(descriptor: &CodecDescriptor) -> Self {
        Self {
            attribs: CodecAttributes {
                name: "L16",
                bits_per_sample: 16,
                frame_duration_ms: descriptor.frame_duration_ms,
            },
        }
    }
}

impl Codec for LpcmCodec {
    fn attribs(&self) -> &CodecAttributes {
        &self.attribs
    }

    fn encode(&mut self, pcm: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.extend_from_slice(pcm);
        Ok(())
    }

    fn decode(&mut self, encoded: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.extend_from_slice(encoded);
        Ok(())
    }

    fn fill_silence(&self, out: &mut Vec<u8>) {
        out.fill(0);
    }
}
