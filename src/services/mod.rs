pub mod settings;
pub mod window_layer;
pub mod window_snap;

pub use settings::SettingsService;
pub use window_layer::create_window_layer;
pub use window_snap::SnapEngine;
