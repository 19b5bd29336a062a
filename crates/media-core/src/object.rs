//! Media objects: the processable units a context ticks.

use crate::error::Result;

/// A directional connection between two streams, processed once per
/// engine tick.
pub trait MediaObject: Send {
    /// Object name for diagnostics.
    fn name(&self) -> &str;

    /// Move one tick of media from source to sink.
    fn process(&mut self) -> Result<()>;

    /// Log the media path.
    fn trace(&self) {}

    /// Release stream sides held by the object.
    fn destroy(&mut self) {}
}
