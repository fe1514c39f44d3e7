pub mod aggregate;
pub mod compatibility;
pub mod config;
pub mod engine;
pub mod features;
pub mod playlist;
pub mod preferences;

pub use engine::{CompatibilityEngine, CompatibilityError, TransitionResult};
pub use features::FeatureRecord;
pub use playlist::{PlaylistValidation, PlaylistValidator, validate_playlist};
pub use preferences::UserPreferences;

/// Application name for XDG paths
pub const APP_NAME: &str = "segue";
