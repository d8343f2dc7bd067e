static INIT: std::sync::Once = std::sync::Once::new();

pub const LOG_ENV: &str = "SCHOOLHUB_LOG";
pub const LOG_PATH_ENV: &str = "SCHOOLHUB_LOG_PATH";

fn init_tracing_subscriber() {
    use std::io;
    use std::{env, fs};
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::from("off"));
    let b = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    let file = env::var(LOG_PATH_ENV).ok().and_then(|p| {
        match fs::OpenOptions::new().append(true).create(true).open(&p) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("cannot open log file {p}: {e}, logging to stderr");
                None
            }
        }
    });
    match file {
        Some(f) => b.with_writer(f).init(),
        None => b.with_writer(io::stderr).init(),
    }
}

pub fn set_global_logger() {
    INIT.call_once(|| {
        init_tracing_subscriber();
        tracing::debug!("Logger initialized");
    });
}
