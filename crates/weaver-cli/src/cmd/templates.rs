use anyhow::Result;
use clap::Subcommand;

use crate::http;
use crate::output::{numeric, print_json, print_table, text};

#[derive(Subcommand, Debug)]
pub enum TemplatesSubcommand {
    /// List available templates
    List,
    /// Show one template, config payload included
    Show { id: u64 },
}

pub fn run(server: &str, subcommand: TemplatesSubcommand, json: bool) -> Result<()> {
    match subcommand {
        TemplatesSubcommand::List => list(server, json),
        TemplatesSubcommand::Show { id } => {
            let template = http::get(server, &format!("/api/status/templates/{id}"))?;
            print_json(&template)
        }
    }
}

fn list(server: &str, json: bool) -> Result<()> {
    let templates = http::get(server, "/api/status/templates")?;
    if json {
        return print_json(&templates);
    }

    let columns = [numeric("ID"), text("NAME"), text("TYPE"), text("DESCRIPTION")];
    let rows: Vec<Vec<String>> = templates
        .as_array()
        .map(|list| {
            list.iter()
                .map(|t| {
                    vec![
                        t["id"].to_string(),
                        t["name"].as_str().unwrap_or_default().to_string(),
                        t["type"].as_str().unwrap_or_default().to_string(),
                        t["description"].as_str().unwrap_or_default().to_string(),
                    ]
                })
                .collect()
        })
        .unwrap_or_default();
    print_table(&columns, rows);
    Ok(())
}
