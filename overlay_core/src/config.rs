//! Configuration loaded from `.markup-overlay.toml`.
//!
//! ```toml
//! [validators]
//! strong = false
//!
//! [[validators.custom]]
//! name = "code"
//! pattern = "`([^`]+)`"
//! visible_groups = [1]
//!
//! [render]
//! font_size = 12.0
//! timeout_ms = 5000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use markup_overlay_render::RenderConfig;
use serde::Deserialize;

use crate::error::{OverlayError, Result};
use crate::validator::Validator;

/// File name searched for by `discover_config`.
pub const CONFIG_FILE_NAME: &str = ".markup-overlay.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub validators: ValidatorSettings,
    pub render: RenderConfig,
}

/// Which validators to install.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// `{{ key : value }}` metadata.
    pub meta: bool,
    /// `'''text'''` emphasis.
    pub emphasis: bool,
    /// `__text__` strong text.
    pub strong: bool,
    /// `$expr$` inline math.
    pub math: bool,
    /// Extra hiding validators.
    pub custom: Vec<CustomValidator>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            meta: true,
            emphasis: true,
            strong: true,
            math: true,
            custom: Vec::new(),
        }
    }
}

/// A user-defined hiding validator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomValidator {
    pub name: String,
    pub pattern: String,
    /// Capture groups left visible while the match is hidden.
    #[serde(default)]
    pub visible_groups: Vec<usize>,
}

impl OverlayConfig {
    /// Builds the validator set in installation order: the built-in
    /// hiding validators, custom ones, then math.
    pub fn build_validators(&self) -> Result<Vec<Validator>> {
        let settings = &self.validators;
        let mut validators = Vec::new();

        let builtins: [(bool, &str, fn() -> std::result::Result<Validator, regex::Error>); 3] = [
            (settings.meta, "meta", Validator::meta),
            (settings.emphasis, "emphasis", Validator::emphasis),
            (settings.strong, "strong", Validator::strong),
        ];
        for (enabled, name, build) in builtins {
            if enabled {
                validators.push(build().map_err(|e| OverlayError::pattern(name, e))?);
            }
        }

        for custom in &settings.custom {
            let validator =
                Validator::custom(&custom.name, &custom.pattern, custom.visible_groups.clone())
                    .map_err(|e| OverlayError::pattern(&custom.name, e))?;

            let available = validator.pattern().group_count();
            if let Some(&group) = custom.visible_groups.iter().find(|&&g| g >= available) {
                return Err(OverlayError::InvalidGroup {
                    name: custom.name.clone(),
                    group,
                    available,
                });
            }
            validators.push(validator);
        }

        if settings.math {
            validators.push(
                Validator::math(self.render.clone())
                    .map_err(|e| OverlayError::pattern("math", e))?,
            );
        }

        Ok(validators)
    }
}

/// Loads a configuration file.
pub fn load_config(path: &Path) -> Result<OverlayConfig> {
    let content = fs::read_to_string(path).map_err(|e| OverlayError::io(path, e))?;
    toml::from_str(&content).map_err(|source| OverlayError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds `.markup-overlay.toml` in `start_dir` or its ancestors.
///
/// Returns the loaded configuration and the file it came from, or the
/// defaults and `None` if there is no such file.
pub fn discover_config(start_dir: &Path) -> Result<(OverlayConfig, Option<PathBuf>)> {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            log::info!("Using config {}", candidate.display());
            return Ok((load_config(&candidate)?, Some(candidate)));
        }
        current = dir.parent();
    }
    Ok((OverlayConfig::default(), None))
}
