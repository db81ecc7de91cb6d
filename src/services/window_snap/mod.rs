//! WindowSnap service: responsibility and boundaries
//!
//! The snap engine owns all attach/detach decisions and the shared
//! per-window state behind a single mutex. It talks to the window system
//! only through the `WindowLayer` trait and never holds its mutex across
//! a layer call: geometry queries and position writes may block or
//! synchronously re-enter the engine through a move notification.

mod bridge;
mod engine;
mod registry;
mod sync;
mod threshold;

pub use engine::SnapEngine;
