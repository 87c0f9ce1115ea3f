//! Deployment configuration (spec §4.F).
//!
//! A thin `clap::Parser` struct, parsed once in `main` and threaded down to
//! the store and engine, following the command-line-arguments pattern the
//! rest of the retrieved pack's binaries use.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line configuration for the `vospace-server` binary.
#[derive(Parser, Debug)]
#[command(name = "vospace-server")]
#[command(about = "VOSpace 2.1 node namespace and transfer job server")]
pub struct Config {
    /// Path to the embedded libsql database file.
    #[arg(long, value_name = "PATH", default_value = "vospace.db")]
    pub db_path: PathBuf,

    /// The VOSpace `vos://<space_name>!vospace/` authority used when
    /// encoding node and transfer URIs.
    #[arg(long, default_value = "vospace")]
    pub space_name: String,

    /// Address the HTTP dispatcher binds to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// Hard cap on the number of children a directory listing returns,
    /// independent of any caller-supplied `limit` query parameter.
    #[arg(long, default_value_t = 10_000)]
    pub directory_limit_cap: usize,

    /// Bounded grace period a cooperative job abort waits for the storage
    /// backend before forcing the terminal phase regardless (spec §4.C,
    /// "Cancellation").
    #[arg(long, value_parser = parse_seconds, default_value = "5")]
    pub abort_grace_period: Duration,
}

fn parse_seconds(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    raw.parse::<u64>().map(Duration::from_secs)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
