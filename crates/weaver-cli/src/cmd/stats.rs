use anyhow::Result;

use crate::http;
use crate::output::{numeric, print_json, print_table, text};

pub fn run(server: &str, json: bool) -> Result<()> {
    let stats = http::get(server, "/api/status/stats")?;
    if json {
        return print_json(&stats);
    }

    let columns = [text("STATUS"), numeric("COUNT")];
    let rows: Vec<Vec<String>> = stats["job_statistics"]
        .as_object()
        .map(|counts| {
            counts
                .iter()
                .map(|(status, count)| vec![status.clone(), count.to_string()])
                .collect()
        })
        .unwrap_or_default();
    print_table(&columns, rows);
    println!();
    println!("Jobs in the last 24h: {}", stats["recent_jobs_24h"]);
    println!("Total API calls:      {}", stats["total_api_calls"]);
    Ok(())
}
