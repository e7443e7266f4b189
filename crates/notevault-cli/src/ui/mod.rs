//! Terminal output: mode detection, badges, tables and spinners.

pub mod context;
pub mod format;
pub mod mode;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use progress::Spinner;
pub use theme::Badge;
