use anyhow::{Context, bail};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the identity server binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for local development.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "imprint-axum-server",
    version,
    about = "An HTTP service resolving stable per-browser identities"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:3000"))]
    pub server_addr: String,

    /// Path of the JSON identity index file. When omitted, identities live
    /// in memory only and every restart re-fingerprints all browsers.
    ///
    /// Environment variable: `STORE_PATH`
    #[arg(long, env = "STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Sliding TTL of the fast identity cache, in seconds.
    ///
    /// Environment variable: `CACHE_TTL_SECS`
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 86_400)]
    pub cache_ttl_secs: u64,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub store_path: Option<PathBuf>,
    pub cache_ttl: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.cache_ttl_secs == 0 {
            bail!("CACHE_TTL_SECS must be greater than 0");
        }

        let addr = args
            .server_addr
            .parse()
            .with_context(|| format!("invalid SERVER_ADDR: {}", args.server_addr))?;

        Ok(Self {
            addr,
            store_path: args.store_path,
            cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        })
    }
}
