mod config;
mod error;
mod layout;
mod locator;
mod rules;

pub use config::{default_config_path, ColorChoice, GstPatchConfig, LayoutConfig};
pub use error::{ErrorCategory, MutationStep, PatchError};
pub use layout::Installation;
pub use locator::{locate_installations, require_installations};
pub use rules::{default_library_rules, matches_any, BundleMatcher, LibraryRule};
