//! WindowLayer service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the
//! window system: resolving window handles, querying and setting geometry,
//! and delivering "window moved" notifications. They MUST NOT contain any
//! snapping logic. All attach/detach decisions are made exclusively by the
//! snap engine in `services::window_snap`.

mod dry_run;
mod sway;
mod xdotool;
mod r#trait;

pub use self::r#trait::{create_window_layer, MoveCallback, SubscriptionId, WindowLayer};
pub use dry_run::DryRunLayer;
