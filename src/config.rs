//! Validator configuration.
//!
//! Loads, merges and validates `mailgate.toml`. Stock defaults are
//! serialized to a TOML table, the user file is deep-merged on top, and the
//! result is deserialized and range-checked. Every key is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! budget_bytes = 307200     # Max encoded archive size (300 KiB)
//! max_image_width = 600     # Widest image allowed, in pixels
//! target_dpi = 72           # Required density when an image declares one
//!
//! [resize]
//! start_quality = 80        # First re-encode quality
//! min_quality = 40          # Quality floor
//! quality_step = 10
//! start_width_factor = 1.0  # Fraction of original width
//! min_width_factor = 0.5    # Width floor
//! width_factor_step = 0.1
//!
//! [css]
//! fetch_remote = true       # Fetch http(s) stylesheets for inlining
//! fetch_timeout_secs = 10
//!
//! [checks]
//! auto_fix = false          # Offer a repaired document for structural issues
//! apply_fixes = false       # Adopt the repaired document and re-validate
//! link_hygiene = false      # Enable the link/URL/width hygiene check
//!
//! [processing]
//! max_processes = 4         # Max parallel check workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mailgate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Validator configuration loaded from `mailgate.toml`.
///
/// All fields have defaults matching the publishing target's limits. Unknown
/// keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Size, width and density limits.
    pub limits: LimitsConfig,
    /// Resize search space.
    pub resize: ResizeConfig,
    /// Stylesheet inlining.
    pub css: CssConfig,
    /// Optional checks and fix handling.
    pub checks: ChecksConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ValidatorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.into()));

        if self.limits.budget_bytes == 0 {
            return invalid("limits.budget_bytes must be non-zero");
        }
        if self.limits.max_image_width == 0 {
            return invalid("limits.max_image_width must be non-zero");
        }
        if self.limits.target_dpi == 0 {
            return invalid("limits.target_dpi must be non-zero");
        }

        let r = &self.resize;
        if !(1..=100).contains(&r.start_quality) || !(1..=100).contains(&r.min_quality) {
            return invalid("resize qualities must be 1-100");
        }
        if r.min_quality > r.start_quality {
            return invalid("resize.min_quality must not exceed resize.start_quality");
        }
        if r.quality_step == 0 {
            return invalid("resize.quality_step must be non-zero");
        }
        if !(r.min_width_factor > 0.0 && r.start_width_factor <= 1.0) {
            return invalid("resize width factors must be within (0, 1]");
        }
        if r.min_width_factor > r.start_width_factor {
            return invalid("resize.min_width_factor must not exceed resize.start_width_factor");
        }
        if r.width_factor_step <= 0.0 {
            return invalid("resize.width_factor_step must be positive");
        }

        if self.css.fetch_timeout_secs == 0 {
            return invalid("css.fetch_timeout_secs must be non-zero");
        }
        if self.checks.apply_fixes && !self.checks.auto_fix {
            return invalid("checks.apply_fixes requires checks.auto_fix");
        }
        Ok(())
    }
}

/// Publishing limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum encoded archive size in bytes.
    pub budget_bytes: usize,
    pub max_image_width: u32,
    pub target_dpi: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 300 * 1024,
            max_image_width: 600,
            target_dpi: 72,
        }
    }
}

/// The two-dimensional resize search: quality first, then width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub start_quality: u32,
    pub min_quality: u32,
    pub quality_step: u32,
    pub start_width_factor: f64,
    pub min_width_factor: f64,
    pub width_factor_step: f64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            start_quality: 80,
            min_quality: 40,
            quality_step: 10,
            start_width_factor: 1.0,
            min_width_factor: 0.5,
            width_factor_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CssConfig {
    /// Fetch `http(s)` stylesheets. When off, remote links stay unresolved.
    pub fetch_remote: bool,
    pub fetch_timeout_secs: u64,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            fetch_remote: true,
            fetch_timeout_secs: 10,
        }
    }
}

impl CssConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    /// Attach a repaired document to structural violations.
    pub auto_fix: bool,
    /// Adopt the repaired document and run the battery once more.
    pub apply_fixes: bool,
    pub link_hygiene: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel check workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ValidatorConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ValidatorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ValidatorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, or stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<ValidatorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `mailgate.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mailgate configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# mailgate reads ./mailgate.toml unless --config points elsewhere.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Publishing limits
# ---------------------------------------------------------------------------
[limits]
# Maximum size of the encoded archive in bytes. Larger uploads go through
# the image resize search before validation.
budget_bytes = 307200

# Widest image allowed, in pixels. Also caps the width of resized images.
max_image_width = 600

# Required density for images that declare one. Images without a density
# declaration are not judged on it.
target_dpi = 72

# ---------------------------------------------------------------------------
# Image resize search (quality first, then width)
# ---------------------------------------------------------------------------
[resize]
start_quality = 80
min_quality = 40
quality_step = 10

# Fraction of each image's original width.
start_width_factor = 1.0
min_width_factor = 0.5
width_factor_step = 0.1

# ---------------------------------------------------------------------------
# Stylesheet inlining
# ---------------------------------------------------------------------------
[css]
# Fetch http(s) stylesheets referenced by <link rel="stylesheet">.
# When false, remote links are reported as unresolved.
fetch_remote = true

# Per-request timeout for remote stylesheets, in seconds.
fetch_timeout_secs = 10

# ---------------------------------------------------------------------------
# Checks
# ---------------------------------------------------------------------------
[checks]
# Attach a repaired document when unbalanced or empty tags are found.
# The violation is still reported.
auto_fix = false

# Adopt the repaired document and validate once more (requires auto_fix).
apply_fixes = false

# Enable the link hygiene check (external CSS, relative hrefs, long URLs,
# oversized width attributes).
link_hygiene = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel check workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
