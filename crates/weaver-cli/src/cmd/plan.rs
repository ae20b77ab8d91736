use anyhow::{anyhow, Result};
use std::path::Path;

use weaver_core::plan::plan;
use weaver_core::validate::validate_with;

use crate::output::{numeric, print_json, print_table, text};

pub fn run(file: &Path, allow_sites: Vec<String>, json: bool) -> Result<()> {
    let config = super::load_config(file)?;

    let result = validate_with(&config, &super::ruleset_from(allow_sites));
    if !result.valid {
        for error in &result.errors {
            eprintln!("error: {error}");
        }
        return Err(anyhow!(
            "configuration is invalid ({} errors); not planning",
            result.errors.len()
        ));
    }

    let tasks = plan(&config)?;

    if json {
        print_json(&tasks)?;
    } else {
        let columns = [
            numeric("#"),
            text("TASK"),
            text("KIND"),
            text("TARGET"),
            text("DEPENDS ON"),
        ];
        let rows: Vec<Vec<String>> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                vec![
                    (i + 1).to_string(),
                    t.name.clone(),
                    t.kind.label().to_string(),
                    t.target.clone(),
                    t.depends_on.join(", "),
                ]
            })
            .collect();
        print_table(&columns, rows);
        println!("\n{} tasks.", tasks.len());
    }
    Ok(())
}
