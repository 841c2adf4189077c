use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::rules::{default_library_rules, BundleMatcher, LibraryRule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Names that make up an installation's on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub product: String,
    pub bundle_suffix: String,
    pub marker: String,
    pub backup_dir: String,
    pub replaceable_binary: String,
    pub wine_unix_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            product: "CrossOver".to_string(),
            bundle_suffix: ".app".to_string(),
            marker: ".gstreamer-patched".to_string(),
            backup_dir: ".gstreamer-backup".to_string(),
            replaceable_binary: "winegstreamer.so".to_string(),
            wine_unix_dir: "lib/wine/x86_64-unix".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn bundle_matcher(&self) -> BundleMatcher {
        BundleMatcher::new(&self.product, &self.bundle_suffix)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("product", &self.product),
            ("marker", &self.marker),
            ("backup_dir", &self.backup_dir),
            ("replaceable_binary", &self.replaceable_binary),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("layout.{key} must not be empty"));
            }
            if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
                return Err(anyhow!("layout.{key} must be a single path component: {value}"));
            }
        }

        let wine_unix_dir = Path::new(&self.wine_unix_dir);
        let mut wine_components = wine_unix_dir.components();
        let Some(Component::Normal(wine_root)) = wine_components.next() else {
            return Err(anyhow!(
                "layout.wine_unix_dir must be a relative path: {}",
                self.wine_unix_dir
            ));
        };
        if !wine_components.all(|component| matches!(component, Component::Normal(_))) {
            return Err(anyhow!(
                "layout.wine_unix_dir must not contain '.' or '..': {}",
                self.wine_unix_dir
            ));
        }

        if self.marker == self.backup_dir {
            return Err(anyhow!("layout.marker and layout.backup_dir must differ"));
        }

        // restore deletes these recursively; they must never alias live library dirs
        let staging = format!("{}.partial", self.backup_dir);
        let wine_root = wine_root.to_string_lossy();
        let live: [&str; 3] = ["lib", "lib64", &wine_root];
        for (key, value) in [
            ("marker", self.marker.as_str()),
            ("backup_dir", self.backup_dir.as_str()),
            ("backup_dir", staging.as_str()),
        ] {
            if live.contains(&value) {
                return Err(anyhow!(
                    "layout.{key} collides with the installation's {value} directory"
                ));
            }
        }
        if self.marker == staging {
            return Err(anyhow!(
                "layout.marker collides with the backup staging dir: {staging}"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GstPatchConfig {
    pub apps_root: PathBuf,
    pub framework_dir: PathBuf,
    pub artifact: Option<PathBuf>,
    pub color: ColorChoice,
    pub layout: LayoutConfig,
    pub library_rules: Vec<LibraryRule>,
}

impl Default for GstPatchConfig {
    fn default() -> Self {
        Self {
            apps_root: PathBuf::from("/Applications"),
            framework_dir: PathBuf::from("/Library/Frameworks/GStreamer.framework"),
            artifact: None,
            color: ColorChoice::Auto,
            layout: LayoutConfig::default(),
            library_rules: default_library_rules(),
        }
    }
}

impl GstPatchConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse gstpatch config")?;
        config.layout.validate()?;
        if config.library_rules.is_empty() {
            return Err(anyhow!("library_rules must contain at least one rule"));
        }
        if let Some(rule) = config
            .library_rules
            .iter()
            .find(|rule| rule.prefix.trim().is_empty())
        {
            return Err(anyhow!(
                "library rule prefix must not be empty (suffix={:?})",
                rule.suffix
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Explicit path wins; otherwise the per-user file is used when present.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(config_home).join("gstpatch").join("config.toml"));
    }
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("gstpatch")
            .join("config.toml"),
    )
}
