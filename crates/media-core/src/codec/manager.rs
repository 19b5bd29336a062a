//! Codec registry.

use tracing::debug;

use super::{Codec, CodecDescriptor, G711Codec, G711Variant, LpcmCodec};
use crate::error::{Error, Result};

/// Creates codec instances for negotiated descriptors.
///
/// The default manager knows PCMU, PCMA and L16. The bridge builder asks
/// it for a codec whenever a termination's descriptor is not linear or a
/// null bridge needs encoded silence.
pub struct CodecManager {
    names: Vec<&'static str>,
}

impl CodecManager {
    /// Manager with the default codec set.
    pub fn new() -> Self {
        Self {
            names: vec!["PCMU", "PCMA", "L16"],
        }
    }

    /// True when a codec with this name is registered.
    pub fn supports(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Instantiate a codec for the descriptor.
    pub fn codec_for(&self, descriptor: &CodecDescriptor) -> Result<Box<dyn Codec>> {
        if !self.supports(&descriptor.name) {
            return Err(Error::NoCodec(descriptor.to_string()));
        }
        debug!("Creating codec for {}", descriptor);
        let codec: Box<dyn Codec> = if descriptor.name.eq_ignore_ascii_case("PCMU") {
            Box::new(G711Codec::new(G711Variant::Pcmu, descriptor))
        } else if descriptor.name.eq_ignore_ascii_case("PCMA") {
            Box::new(G711Codec::new(G711Variant::Pcma, descriptor))
        } else {
            Box::new(LpcmCodec::new(descriptor))
        };
        Ok(codec)
    }
}

impl Default for CodecManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codecs() {
        let manager = CodecManager::new();
        assert!(manager.supports("pcmu"));
        assert!(manager.supports("L16"));
        assert!(!manager.supports("OPUS"));

        let codec = manager.codec_for(&CodecDescriptor::pcma()).unwrap();
        assert_eq!(codec.attribs().name, "PCMA");
        assert_eq!(codec.attribs().frame_duration_ms, 20);

        let mut unknown = CodecDescriptor::pcmu();
        unknown.name = "G729".to_string();
        assert!(manager.codec_for(&unknown).is_err());
    }
}
