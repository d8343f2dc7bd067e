use std::env;
use std::sync::Arc;

use anyhow::Result;
use schoolhub::auth::StderrLoginRedirect;
use schoolhub::log::set_global_logger;
use schoolhub::run;

#[tokio::main]
async fn main() -> Result<()> {
    set_global_logger();

    let args = env::args_os()
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    let output = run(args, Arc::new(StderrLoginRedirect)).await?;
    println!("{output}");
    Ok(())
}
