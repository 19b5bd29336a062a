//! Media context: termination slots and the topology built over them.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bridge::create_bridge;
use crate::codec::CodecManager;
use crate::error::{Error, Result};
use crate::object::MediaObject;
use crate::termination::{Termination, TerminationId};

/// Maximum terminations per context.
pub const MAX_TERMINATION_COUNT: usize = 8;

/// Context identifier, unique per engine.
pub type ContextId = u64;

/// Container of up to [`MAX_TERMINATION_COUNT`] terminations and the
/// pairwise directional objects connecting them.
pub struct MediaContext {
    /// Identifier assigned by the creator
    pub id: ContextId,
    /// Name for diagnostics
    pub name: String,
    codec_manager: Arc<CodecManager>,
    terminations: [Option<Termination>; MAX_TERMINATION_COUNT],
    objects: [Option<Box<dyn MediaObject>>; MAX_TERMINATION_COUNT],
    termination_count: usize,
}

impl MediaContext {
    /// Empty context.
    pub fn new(id: ContextId, name: impl Into<String>, codec_manager: Arc<CodecManager>) -> Self {
        Self {
            id,
            name: name.into(),
            codec_manager,
            terminations: Default::default(),
            objects: Default::default(),
            termination_count: 0,
        }
    }

    /// Number of terminations currently added.
    pub fn termination_count(&self) -> usize {
        self.termination_count
    }

    /// True when a directional object exists in the given slot.
    pub fn has_object(&self, slot: usize) -> bool {
        self.objects.get(slot).map(|o| o.is_some()).unwrap_or(false)
    }

    /// Add a termination into the lowest free slot and rebuild the
    /// topology.
    pub fn add_termination(&mut self, termination: Termination) -> Result<usize> {
        let slot = self
            .terminations
            .iter()
            .position(|t| t.is_none())
            .ok_or_else(|| Error::ContextFull(self.name.clone()))?;
        debug!(
            "Add termination [{}] to context [{}] slot {}",
            termination.name, self.name, slot
        );
        self.terminations[slot] = Some(termination);
        self.termination_count += 1;
        self.topology_apply();
        Ok(slot)
    }

    /// Destroy the topology, then detach and return the termination.
    pub fn subtract_termination(&mut self, id: TerminationId) -> Result<Termination> {
        let slot = self
            .terminations
            .iter()
            .position(|t| t.as_ref().map(|t| t.id) == Some(id))
            .ok_or(Error::UnknownTermination(id))?;
        self.topology_destroy();
        let termination = self.terminations[slot].take().expect("termination in slot");
        debug!(
            "Subtract termination [{}] from context [{}]",
            termination.name, self.name
        );
        self.termination_count -= 1;
        self.topology_apply();
        Ok(termination)
    }

    /// Rebuild the topology after a termination changed.
    pub fn modify_termination(&mut self, id: TerminationId) -> Result<()> {
        if !self
            .terminations
            .iter()
            .any(|t| t.as_ref().map(|t| t.id) == Some(id))
        {
            return Err(Error::UnknownTermination(id));
        }
        self.topology_destroy();
        self.topology_apply();
        Ok(())
    }

    /// Tick every directional object in slot order.
    pub fn process(&mut self) {
        for object in self.objects.iter_mut().flatten() {
            if let Err(e) = object.process() {
                warn!("Media object [{}] failed: {}", object.name(), e);
            }
        }
    }

    /// Tear down everything before dropping the context.
    pub fn destroy(&mut self) {
        self.topology_destroy();
        for slot in &mut self.terminations {
            *slot = None;
        }
        self.termination_count = 0;
    }

    fn topology_apply(&mut self) {
        if self.termination_count < 2 {
            return;
        }
        let (Some(first), Some(second)) = (&self.terminations[0], &self.terminations[1]) else {
            return;
        };

        // One directional object per ordered pair, gated on the stream
        // modes: the source must receive, the sink must send.
        let pairs = [(first, second, 0usize), (second, first, 1usize)];
        let mut created: [Option<Box<dyn MediaObject>>; 2] = [None, None];
        for (source, sink, slot) in pairs {
            if !source.direction().can_receive() || !sink.direction().can_send() {
                continue;
            }
            let name = format!("{}->{}", source.name, sink.name);
            match create_bridge(source.stream(), sink.stream(), &self.codec_manager, &name) {
                Ok(bridge) => {
                    bridge.trace();
                    created[slot] = Some(Box::new(bridge));
                }
                Err(e) => warn!("Failed to connect {}: {}", name, e),
            }
        }
        let [a, b] = created;
        if a.is_some() {
            self.objects[0] = a;
        }
        if b.is_some() {
            self.objects[1] = b;
        }
    }

    fn topology_destroy(&mut self) {
        for object in self.objects.iter_mut() {
            if let Some(mut object) = object.take() {
                object.destroy();
            }
        }
    }
}

impl Drop for MediaContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::codec::CodecDescriptor;
    use crate::frame::{FrameKind, MediaFrame};

    fn context() -> MediaContext {
        MediaContext::new(1, "ctx", Arc::new(CodecManager::new()))
    }

    #[test]
    fn test_topology_builds_when_second_termination_arrives() {
        let mut ctx = context();
        let descriptor = CodecDescriptor::lpcm(8000);
        let in_buffer = AudioBuffer::new(8);
        let out_buffer = AudioBuffer::new(8);

        ctx.add_termination(Termination::buffer_source(
            1,
            "src",
            in_buffer.clone(),
            descriptor.clone(),
        ))
        .unwrap();
        assert!(!ctx.has_object(0));

        ctx.add_termination(Termination::buffer_sink(
            2,
            "snk",
            out_buffer.clone(),
            descriptor.clone(),
        ))
        .unwrap();

        // src receives, snk sends: exactly the 0->1 object exists.
        assert!(ctx.has_object(0));
        assert!(!ctx.has_object(1));

        // A queued frame moves through on process.
        let frame_size = descriptor.linear_frame_size();
        let mut frame = MediaFrame::with_size(frame_size);
        frame.kind.insert(FrameKind::AUDIO);
        frame.audio.fill(9);
        in_buffer.push(frame).unwrap();

        // 20 ms frames on the 10 ms tick base: the second tick moves it.
        ctx.process();
        ctx.process();
        let moved = out_buffer.pop().expect("frame moved");
        assert!(moved.audio.iter().all(|&b| b == 9));
    }

    #[test]
    fn test_subtract_destroys_topology() {
        let mut ctx = context();
        let descriptor = CodecDescriptor::lpcm(8000);
        let in_buffer = AudioBuffer::new(4);
        let out_buffer = AudioBuffer::new(4);

        ctx.add_termination(Termination::buffer_source(
            1,
            "src",
            in_buffer,
            descriptor.clone(),
        ))
        .unwrap();
        ctx.add_termination(Termination::buffer_sink(
            2,
            "snk",
            out_buffer,
            descriptor,
        ))
        .unwrap();
        assert!(ctx.has_object(0));

        let removed = ctx.subtract_termination(2).unwrap();
        assert_eq!(removed.id, 2);
        assert!(!ctx.has_object(0));
        assert_eq!(ctx.termination_count(), 1);

        assert!(ctx.subtract_termination(42).is_err());
    }

    #[test]
    fn test_slots_fill_lowest_first() {
        let mut ctx = context();
        let descriptor = CodecDescriptor::lpcm(8000);
        for id in 1..=3u64 {
            let buffer = AudioBuffer::new(2);
            ctx.add_termination(Termination::buffer_source(
                id,
                format!("t{id}"),
                buffer,
                descriptor.clone(),
            ))
            .unwrap();
        }
        ctx.subtract_termination(2).unwrap();
        let buffer = AudioBuffer::new(2);
        let slot = ctx
            .add_termination(Termination::buffer_source(9, "t9", buffer, descriptor))
            .unwrap();
        assert_eq!(slot, 1);
    }

    #[test]
    fn test_context_capacity() {
        let mut ctx = context();
        let descriptor = CodecDescriptor::lpcm(8000);
        for id in 0..MAX_TERMINATION_COUNT as u64 {
            let buffer = AudioBuffer::new(2);
            ctx.add_termination(Termination::buffer_source(
                id,
                format!("t{id}"),
                buffer,
                descriptor.clone(),
            ))
            .unwrap();
        }
        let buffer = AudioBuffer::new(2);
        assert!(ctx
            .add_termination(Termination::buffer_source(99, "over", buffer, descriptor))
            .is_err());
    }
}
