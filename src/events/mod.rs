pub mod window;

pub use window::{SnapEdge, SnapOffset, WindowId, WindowMoveEvent, WindowPosition, WindowSize};
