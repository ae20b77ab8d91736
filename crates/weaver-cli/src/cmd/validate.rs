use anyhow::{anyhow, Result};
use std::path::Path;

use weaver_core::validate::validate_with;

use crate::output::print_json;

pub fn run(file: &Path, allow_sites: Vec<String>, json: bool) -> Result<()> {
    let config = super::load_config(file)?;
    let result = validate_with(&config, &super::ruleset_from(allow_sites));

    if json {
        print_json(&result)?;
    } else {
        for warning in &result.warnings {
            println!("warning: {warning}");
        }
        for error in &result.errors {
            println!("error: {error}");
        }
        if result.valid {
            println!(
                "Configuration is valid ({} entities).",
                config.entity_count()
            );
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow!(
            "configuration is invalid ({} errors)",
            result.errors.len()
        ))
    }
}
