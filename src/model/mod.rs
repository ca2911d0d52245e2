// The segmented timeline: every track's audio lives in fixed-capacity bars,
// positions are absolute sample offsets, and all cross-thread access goes
// through SharedSeq snapshots and per-bar locks.

mod bar;
mod error;
mod events;
mod shared_seq;
mod song;
mod track;

pub use bar::Bar;
pub use error::ModelError;
pub use events::{EventBus, ModelEvent, UpdateKind};
pub use shared_seq::SharedSeq;
pub use song::{LoopRegion, Song};
pub use track::Track;
