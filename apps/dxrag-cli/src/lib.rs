//! Helpers shared by the dxrag binaries.

use std::path::PathBuf;

use dxrag_core::config::{Config, Settings};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `info` for everything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Validated `[retrieval]` settings plus the directory relative paths are
/// resolved against.
pub fn load_settings() -> anyhow::Result<(Settings, PathBuf)> {
    let config = Config::load()?;
    let settings = config.settings()?;
    Ok((settings, std::env::current_dir()?))
}

/// Splits `--flag value` pairs from positional words.
pub fn take_flag(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else { return Ok(None) };
    if pos + 1 >= args.len() {
        anyhow::bail!("{flag} requires a value");
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

pub fn take_switch(args: &mut Vec<String>, switch: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != switch);
    args.len() != before
}
