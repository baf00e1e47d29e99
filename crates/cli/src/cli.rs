use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// procsentry: host process monitoring agent
///
/// procsentry periodically enumerates running processes, checks their
/// executables against platform code signing and threat intelligence feeds,
/// and answers detection queries over a local TCP endpoint.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/procsentry/config.toml` and `/etc/procsentry/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// Override the query endpoint port from the configuration.
    #[arg(short, long, value_parser = validate_port)]
    pub port: Option<u16>,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

/// Validate a TCP port; `0` lets the OS pick one.
#[inline(always)]
fn validate_port(port: &str) -> Result<u16, String> {
    port.parse()
        .map_err(|_| format!("`{port}` is not a valid port number"))
}
