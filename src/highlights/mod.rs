#[cfg(feature = "desktop")]
pub mod commands;
pub mod confidence;
pub mod context;
pub mod controller;
pub mod geometry;
pub mod overlay;
pub mod selection;
pub mod store;

pub use confidence::{ColorToken, Confidence};
pub use controller::{DragResolution, HighlightController, RehydrationOutcome};
pub use store::{HighlightStore, StoreError};
