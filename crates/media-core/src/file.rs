//! File-backed audio streams.
//!
//! On-disk representation is raw 16-bit little-endian linear PCM,
//! channels interleaved, no header. The sample order is fixed
//! regardless of host byte order.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::codec::CodecDescriptor;
use crate::error::{Error, Result};
use crate::frame::{FrameKind, MediaFrame};
use crate::stream::{
    AudioStream, CodecCapability, StreamBase, StreamCapabilities, StreamDirection,
};

fn lpcm_base(descriptor: &CodecDescriptor, direction: StreamDirection) -> Result<StreamBase> {
    if !descriptor.is_lpcm() {
        return Err(Error::Stream(format!(
            "file streams carry linear PCM, got {descriptor}"
        )));
    }
    let mut base = StreamBase::new(StreamCapabilities::new(
        direction,
        CodecCapability::new(
            descriptor.name.clone(),
            vec![descriptor.sampling_rate],
        ),
    ));
    match direction {
        StreamDirection::Receive => base.rx_descriptor = Some(descriptor.clone()),
        StreamDirection::Send => base.tx_descriptor = Some(descriptor.clone()),
        _ => {}
    }
    Ok(base)
}

/// Receive stream reading frames from a file until it drains.
pub struct FileReaderStream {
    base: StreamBase,
    file: Option<File>,
}

impl FileReaderStream {
    /// Open `path` for frame reads with the given linear descriptor.
    pub fn open(path: impl AsRef<Path>, descriptor: CodecDescriptor) -> Result<Self> {
        let base = lpcm_base(&descriptor, StreamDirection::Receive)?;
        let file = File::open(path.as_ref())?;
        debug!("Open audio file reader {:?}", path.as_ref());
        Ok(Self {
            base,
            file: Some(file),
        })
    }
}

impl AudioStream for FileReaderStream {
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

    fn rx_close(&mut self) {
        self.file = None;
    }

    fn read_frame(&mut self, frame: &mut MediaFrame) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let mut filled = 0;
        while filled < frame.audio.len() {
            let n = file.read(&mut frame.audio[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            // Drained; subsequent ticks produce nothing.
            self.file = None;
            return Ok(());
        }
        frame.audio[filled..].fill(0);
        frame.kind.insert(FrameKind::AUDIO);
        Ok(())
    }
}

/// Send stream appending frames to a file.
pub struct FileWriterStream {
    base: StreamBase,
    file: Option<File>,
    max_bytes: Option<u64>,
    written: u64,
}

impl FileWriterStream {
    /// Create (truncate) `path` for frame writes.
    pub fn create(path: impl AsRef<Path>, descriptor: CodecDescriptor) -> Result<Self> {
        let base = lpcm_base(&descriptor, StreamDirection::Send)?;
        let file = File::create(path.as_ref())?;
        debug!("Open audio file writer {:?}", path.as_ref());
        Ok(Self {
            base,
            file: Some(file),
            max_bytes: None,
            written: 0,
        })
    }

    /// Stop writing after `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

impl AudioStream for FileWriterStream {
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

    fn tx_close(&mut self) {
        self.file = None;
    }

    fn write_frame(&mut self, frame: &MediaFrame) -> Result<()> {
        if !frame.kind.contains(FrameKind::AUDIO) {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        if let Some(max) = self.max_bytes {
            if self.written >= max {
                return Ok(());
            }
        }
        file.write_all(&frame.audio)?;
        self.written += frame.audio.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("rspeech-file-test-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let path = temp_path("roundtrip.pcm");
        let descriptor = CodecDescriptor::lpcm(8000);
        let frame_size = descriptor.linear_frame_size();

        {
            let mut writer = FileWriterStream::create(&path, descriptor.clone()).unwrap();
            let mut frame = MediaFrame::with_size(frame_size);
            frame.kind.insert(FrameKind::AUDIO);
            for value in [1u8, 2, 3] {
                frame.audio.fill(value);
                writer.write_frame(&frame).unwrap();
            }
            writer.tx_close();
        }

        let mut reader = FileReaderStream::open(&path, descriptor).unwrap();
        let mut frame = MediaFrame::with_size(frame_size);
        for value in [1u8, 2, 3] {
            frame.clear();
            reader.read_frame(&mut frame).unwrap();
            assert!(frame.kind.contains(FrameKind::AUDIO), "frame {value}");
            assert!(frame.audio.iter().all(|&b| b == value));
        }

        // Drained file produces no audio.
        frame.clear();
        reader.read_frame(&mut frame).unwrap();
        assert!(frame.kind.is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_writer_honours_max_bytes() {
        let path = temp_path("capped.pcm");
        let descriptor = CodecDescriptor::lpcm(8000);
        let frame_size = descriptor.linear_frame_size();

        let mut writer = FileWriterStream::create(&path, descriptor)
            .unwrap()
            .with_max_bytes(frame_size as u64);
        let mut frame = MediaFrame::with_size(frame_size);
        frame.kind.insert(FrameKind::AUDIO);
        writer.write_frame(&frame).unwrap();
        writer.write_frame(&frame).unwrap();
        writer.tx_close();

        let written = std::fs::metadata(&path).unwrap().len();
        assert_eq!(written, frame_size as u64);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_non_linear_descriptor_rejected() {
        let path = temp_path("bad.pcm");
        assert!(FileWriterStream::create(&path, CodecDescriptor::pcmu()).is_err());
    }
}
