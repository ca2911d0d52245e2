use thiserror::Error;

/// Errors the model can hand back to a caller.
///
/// Range violations are contract violations: the caller miscalculated an
/// offset, and silently truncating would corrupt the timeline, so we refuse
/// the whole write. "No bar at this position" is never an error; it comes
/// back as `None` from the track lookups.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("write of {len} samples at offset {offset} exceeds bar capacity {capacity}")]
    DestRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("read of {len} samples at offset {offset} exceeds source length {available}")]
    SourceRange {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("samples per bar must be positive (got {0})")]
    ZeroSamplesPerBar(u64),

    #[error("loop begin bar {begin} is past loop end bar {end}")]
    LoopBounds { begin: usize, end: usize },
}
