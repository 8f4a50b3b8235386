pub mod diff;
pub mod frame;
pub mod room;

pub use diff::{DiffKind, DiffLine, diff_lines};
pub use frame::{FrameError, FrameKind, build_snapshot_blob, classify_frame, split_snapshot_blob};
pub use room::{DocumentUpdate, NamedVersion, Room, RoomSnapshot};
