use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::pool::DEFAULT_POOL_CAPACITY;
use crate::query::DEFAULT_SEARCH_TEMPLATE;
use crate::ring::DEFAULT_QUEUE_DEPTH;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BACKLOG: u32 = 1024;
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Parser)]
#[command(name = "bangserver", version, about = "Redirects bang queries to their search engines")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "BANGSERVER_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    #[arg(long, env = "BANGSERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen backlog.
    #[arg(long, env = "BANGSERVER_BACKLOG", default_value_t = DEFAULT_BACKLOG)]
    pub backlog: u32,

    /// Completion queue depth.
    #[arg(long, env = "BANGSERVER_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Bang files in DuckDuckGo bang.js format; later files override earlier ones.
    #[arg(
        long = "bangs",
        env = "BANGSERVER_BANGS",
        value_delimiter = ',',
        default_value = "bangs.json"
    )]
    pub bang_files: Vec<PathBuf>,

    /// Search URL used when no bang matches.
    #[arg(long, env = "BANGSERVER_DEFAULT_SEARCH", default_value = DEFAULT_SEARCH_TEMPLATE)]
    pub default_search: String,

    /// Base URL advertised in the OpenSearch descriptor.
    #[arg(long, env = "BANGSERVER_PUBLIC_URL", default_value = DEFAULT_PUBLIC_URL)]
    pub public_url: String,

    /// Initial number of blocks in each buffer pool.
    #[arg(long, env = "BANGSERVER_POOL_CAPACITY", default_value_t = DEFAULT_POOL_CAPACITY)]
    pub pool_capacity: usize,

    /// Log filter; RUST_LOG takes precedence when set.
    #[arg(long, env = "BANGSERVER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            bang_files: vec![PathBuf::from("bangs.json")],
            default_search: DEFAULT_SEARCH_TEMPLATE.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(Error::Config("queue depth must be at least 1".into()));
        }
        if self.backlog == 0 {
            return Err(Error::Config("backlog must be at least 1".into()));
        }
        if self.default_search.is_empty() {
            return Err(Error::Config("default search URL is empty".into()));
        }
        if self.bang_files.is_empty() {
            return Err(Error::Config("no bang files given".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = Config::try_parse_from(["bangserver"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.queue_depth, default.queue_depth);
        assert_eq!(parsed.pool_capacity, default.pool_capacity);
        assert_eq!(parsed.default_search, default.default_search);
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "bangserver",
            "--bind",
            "127.0.0.1",
            "--port",
            "8080",
            "--bangs",
            "base.json,local.json",
            "--default-search",
            "https://duckduckgo.com/?q=",
        ])
        .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            config.bang_files,
            vec![PathBuf::from("base.json"), PathBuf::from("local.json")]
        );
        assert_eq!(config.default_search, "https://duckduckgo.com/?q=");
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let config = Config {
            queue_depth: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = Config {
            default_search: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
