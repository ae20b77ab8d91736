use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::http;
use crate::output::{numeric, print_json, print_table, text};

#[derive(Subcommand, Debug)]
pub enum JobSubcommand {
    /// Submit a new provisioning job from a configuration file
    Submit {
        /// Job name
        name: String,
        /// Configuration file (.yaml, .yml, or .json)
        #[arg(long)]
        file: PathBuf,
        /// Template id to record on the job
        #[arg(long)]
        template: Option<u64>,
    },
    /// List all jobs
    List,
    /// Show one job, config snapshot included
    Show { id: u64 },
    /// Show a job's task logs
    Logs { id: u64 },
    /// Request cancellation of a running job
    Cancel { id: u64 },
    /// Delete a job and its logs
    Delete { id: u64 },
}

pub fn run(server: &str, subcommand: JobSubcommand, json: bool) -> Result<()> {
    match subcommand {
        JobSubcommand::Submit {
            name,
            file,
            template,
        } => submit(server, &name, &file, template, json),
        JobSubcommand::List => list(server, json),
        JobSubcommand::Show { id } => {
            let job = http::get(server, &format!("/api/provisioning/jobs/{id}"))?;
            print_json(&job)
        }
        JobSubcommand::Logs { id } => logs(server, id, json),
        JobSubcommand::Cancel { id } => {
            let resp = http::post(
                server,
                &format!("/api/provisioning/jobs/{id}/cancel"),
                serde_json::json!({}),
            )?;
            if json {
                print_json(&resp)?;
            } else {
                println!("{}", resp["message"].as_str().unwrap_or("cancelling"));
            }
            Ok(())
        }
        JobSubcommand::Delete { id } => {
            let resp = http::delete(server, &format!("/api/provisioning/jobs/{id}"))?;
            if json {
                print_json(&resp)?;
            } else {
                println!("Deleted job {id}.");
            }
            Ok(())
        }
    }
}

fn submit(
    server: &str,
    name: &str,
    file: &std::path::Path,
    template: Option<u64>,
    json: bool,
) -> Result<()> {
    let config = super::load_config(file)?;
    let body = serde_json::json!({
        "name": name,
        "template_id": template,
        "fabric_config": config,
    });
    let job = http::post(server, "/api/provisioning/jobs", body)?;
    if json {
        print_json(&job)?;
    } else {
        println!(
            "Job {} '{}' created ({}).",
            job["id"], name, job["status"].as_str().unwrap_or("pending")
        );
    }
    Ok(())
}

fn list(server: &str, json: bool) -> Result<()> {
    let jobs = http::get(server, "/api/provisioning/jobs")?;
    if json {
        return print_json(&jobs);
    }

    let columns = [
        numeric("ID"),
        text("NAME"),
        text("STATUS"),
        numeric("PROGRESS"),
        text("CREATED"),
    ];
    let rows: Vec<Vec<String>> = jobs
        .as_array()
        .map(|list| {
            list.iter()
                .map(|j| {
                    vec![
                        j["id"].to_string(),
                        j["name"].as_str().unwrap_or_default().to_string(),
                        j["status"].as_str().unwrap_or_default().to_string(),
                        format!("{}%", j["progress"]),
                        j["created_at"].as_str().unwrap_or_default().to_string(),
                    ]
                })
                .collect()
        })
        .unwrap_or_default();
    print_table(&columns, rows);
    Ok(())
}

fn logs(server: &str, id: u64, json: bool) -> Result<()> {
    let logs = http::get(server, &format!("/api/provisioning/jobs/{id}/logs"))?;
    if json {
        return print_json(&logs);
    }

    let columns = [text("TIME"), text("TASK"), text("SEVERITY"), text("MESSAGE")];
    let rows: Vec<Vec<String>> = logs
        .as_array()
        .map(|list| {
            list.iter()
                .map(|l| {
                    vec![
                        l["timestamp"].as_str().unwrap_or_default().to_string(),
                        l["task_name"].as_str().unwrap_or_default().to_string(),
                        l["severity"].as_str().unwrap_or_default().to_string(),
                        l["message"].as_str().unwrap_or_default().to_string(),
                    ]
                })
                .collect()
        })
        .unwrap_or_default();
    print_table(&columns, rows);
    Ok(())
}
