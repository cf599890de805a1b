/// Lifecycle boundary between a part object model and the package layer.
///
/// The package layer (ZIP access, part addressing, content types) lives
/// outside this crate. It talks to each part through exactly two callbacks:
/// hand the part a readable stream when the package is opened, and hand it a
/// writable stream when the package is saved. The trait is object-safe so a
/// package can hold a heterogeneous set of parts behind `dyn PartLifecycle`.
use crate::error::Result;
use std::io::{Read, Write};

/// Callbacks a package part implements for the container layer.
pub trait PartLifecycle {
    /// Populate the part from its serialized bytes.
    ///
    /// The stream is fully consumed. On failure the part is left
    /// unpopulated; it must not hand out partial content afterwards.
    fn on_read(&mut self, stream: &mut dyn Read) -> Result<()>;

    /// Serialize the part's current state to the stream.
    ///
    /// Pure structural serialization: no cross-entry validation is
    /// performed, and a failed commit leaves the in-memory model unchanged.
    fn on_commit(&self, stream: &mut dyn Write) -> Result<()>;
}
