pub mod background;

pub use background::{BackgroundConfig, remove_background, remove_background_with};
