pub mod job;
pub mod plan;
pub mod serve;
pub mod stats;
pub mod templates;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

use weaver_core::config::FabricConfig;
use weaver_core::validate::Ruleset;

/// Build the validation ruleset from repeated `--allow-site` flags; an
/// empty list keeps the built-in site codes.
pub(crate) fn ruleset_from(allow_sites: Vec<String>) -> Ruleset {
    if allow_sites.is_empty() {
        Ruleset::default()
    } else {
        Ruleset {
            site_codes: allow_sites,
        }
    }
}

/// Load a fabric configuration from a YAML or JSON file, by extension.
pub(crate) fn load_config(file: &Path) -> Result<FabricConfig> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let is_json = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let config = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON config in {}", file.display()))?
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML config in {}", file.display()))?
    };
    Ok(config)
}
