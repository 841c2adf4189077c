use serde::Deserialize;

/// A file name rule for bundled libraries: the entry name must start with
/// `prefix` and, when set, end with `suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryRule {
    pub prefix: String,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl LibraryRule {
    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: None,
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if self.prefix.is_empty() || !file_name.starts_with(&self.prefix) {
            return false;
        }
        match &self.suffix {
            Some(suffix) => {
                file_name.len() >= self.prefix.len() + suffix.len() && file_name.ends_with(suffix)
            }
            None => true,
        }
    }
}

pub fn matches_any(rules: &[LibraryRule], file_name: &str) -> bool {
    rules.iter().any(|rule| rule.matches(file_name))
}

/// GStreamer and the GLib family it drags in.
pub fn default_library_rules() -> Vec<LibraryRule> {
    [
        "libgst",
        "gstreamer-1.0",
        "libglib-2.0",
        "libgobject-2.0",
        "libgio-2.0",
        "libgmodule-2.0",
        "libgthread-2.0",
        "liborc-0.4",
    ]
    .into_iter()
    .map(LibraryRule::prefix)
    .collect()
}

/// Case-insensitive bundle name predicate, e.g. `CrossOver*.app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMatcher {
    product: String,
    suffix: String,
}

impl BundleMatcher {
    pub fn new(product: &str, suffix: &str) -> Self {
        Self {
            product: product.to_lowercase(),
            suffix: suffix.to_lowercase(),
        }
    }

    pub fn matches(&self, dir_name: &str) -> bool {
        let lowered = dir_name.to_lowercase();
        !self.product.is_empty()
            && lowered.len() >= self.product.len() + self.suffix.len()
            && lowered.starts_with(&self.product)
            && lowered.ends_with(&self.suffix)
    }
}
