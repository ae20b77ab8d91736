use anyhow::Result;
use std::path::PathBuf;

use weaver_server::ServeOptions;

pub fn run(port: u16, db: PathBuf, allow_sites: Vec<String>) -> Result<()> {
    let ruleset = super::ruleset_from(allow_sites);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let opts = ServeOptions {
            db_path: db,
            ruleset,
        };
        tokio::select! {
            res = weaver_server::serve(port, opts) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
