//! Progress reporting

/// Sink for progress events of a long running operation
///
/// Every operation calls `init` once, `set_position` any number of times
/// with a non-decreasing byte count, then `finalize` once, also when it
/// fails or has nothing to do.
pub trait Progress {
    /// Operation starts, `total` bytes will be processed
    fn init(&mut self, total: u64);

    /// `position` bytes processed so far
    fn set_position(&mut self, position: u64);

    /// Operation finished
    fn finalize(&mut self);
}

/// A no-op progress reporter
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn init(&mut self, _total: u64) {}
    fn set_position(&mut self, _position: u64) {}
    fn finalize(&mut self) {}
}
