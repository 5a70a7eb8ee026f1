//! # Configuration
//!
//! Endpoint lists and pool sizing for the client. Values come from
//! `CacheConfig::default()` or from environment variables via
//! `CacheConfig::from_env()`.
//!
//! Endpoint lists are semicolon-separated, each entry `[password@]host[:port]`
//! (IPv6 hosts in brackets). The port defaults to 6379.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Port used when an endpoint omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Default live-connection limit for each access mode.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// TTL applied by scalar `set` unless the caller overrides it.
pub const DEFAULT_ITEM_TTL: Duration = Duration::from_secs(60 * 60);

/// Default bound on how long `acquire` waits for a free slot.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// One store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Sent with `AUTH` right after connecting.
    pub password: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
            password: None,
        }
    }

    /// `host:port` form accepted by `ToSocketAddrs`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (password, rest) = match s.rsplit_once('@') {
            Some((password, rest)) if !password.is_empty() => (Some(password.to_string()), rest),
            Some(_) => return Err(CacheError::InvalidEndpoint(s.to_string())),
            None => (None, s),
        };

        // A colon inside brackets belongs to an IPv6 literal, not the port.
        let port_split = match rest.rfind(']') {
            Some(close) => rest[close..].rfind(':').map(|idx| close + idx),
            None => rest.rfind(':'),
        };
        let (host, port) = match port_split {
            Some(idx) => {
                let port = rest[idx + 1..]
                    .parse::<u16>()
                    .map_err(|_| CacheError::InvalidEndpoint(s.to_string()))?;
                (&rest[..idx], port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(CacheError::InvalidEndpoint(s.to_string()));
        }

        Ok(Endpoint {
            host: host.to_string(),
            port,
            password,
        })
    }
}

impl fmt::Display for Endpoint {
    // The password is never printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses a semicolon-separated endpoint list, skipping empty segments.
pub fn parse_endpoints(list: &str) -> CacheResult<Vec<Endpoint>> {
    list.split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(Endpoint::from_str)
        .collect()
}

/// Client configuration: endpoints, pool limits and timeouts.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Endpoints for mutating commands. Must not be empty.
    pub read_write_hosts: Vec<Endpoint>,
    /// Endpoints for read commands; empty means "use the read-write set".
    pub read_only_hosts: Vec<Endpoint>,
    /// Maximum live read-write connections.
    pub max_write_pool_size: usize,
    /// Maximum live read-only connections.
    pub max_read_pool_size: usize,
    /// How long `acquire` waits for a slot; zero fails fast.
    pub acquire_timeout: Duration,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// TTL applied by scalar `set`.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            read_write_hosts: vec![Endpoint::new("127.0.0.1", DEFAULT_PORT)],
            read_only_hosts: Vec::new(),
            max_write_pool_size: DEFAULT_POOL_SIZE,
            max_read_pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            default_ttl: DEFAULT_ITEM_TTL,
        }
    }
}

impl CacheConfig {
    /// Builds a config from endpoint list strings, other fields defaulted.
    pub fn from_hosts(read_write: &str, read_only: &str) -> CacheResult<Self> {
        let config = CacheConfig {
            read_write_hosts: parse_endpoints(read_write)?,
            read_only_hosts: parse_endpoints(read_only)?,
            ..CacheConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `RCACHE_READ_WRITE_HOSTS` - read-write endpoints (default: 127.0.0.1:6379)
    /// - `RCACHE_READ_ONLY_HOSTS` - read-only endpoints (default: none)
    /// - `RCACHE_MAX_WRITE_POOL_SIZE` - read-write pool limit (default: 5)
    /// - `RCACHE_MAX_READ_POOL_SIZE` - read-only pool limit (default: 5)
    /// - `RCACHE_ACQUIRE_TIMEOUT_MS` - acquire wait bound (default: 2000)
    /// - `RCACHE_DEFAULT_TTL_SECS` - scalar set TTL (default: 3600)
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from `RCACHE_*` settings supplied by `lookup`.
    ///
    /// Unset names keep their defaults; see [`CacheConfig::from_env`] for
    /// the recognised names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CacheResult<Self> {
        let mut config = CacheConfig::default();
        let number = |name: &str| parse_number(name, lookup(name));

        if let Some(hosts) = lookup("RCACHE_READ_WRITE_HOSTS") {
            config.read_write_hosts = parse_endpoints(&hosts)?;
        }
        if let Some(hosts) = lookup("RCACHE_READ_ONLY_HOSTS") {
            config.read_only_hosts = parse_endpoints(&hosts)?;
        }
        if let Some(size) = number("RCACHE_MAX_WRITE_POOL_SIZE")? {
            config.max_write_pool_size = size as usize;
        }
        if let Some(size) = number("RCACHE_MAX_READ_POOL_SIZE")? {
            config.max_read_pool_size = size as usize;
        }
        if let Some(ms) = number("RCACHE_ACQUIRE_TIMEOUT_MS")? {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = number("RCACHE_DEFAULT_TTL_SECS")? {
            config.default_ttl = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the pool cannot serve.
    pub fn validate(&self) -> CacheResult<()> {
        if self.read_write_hosts.is_empty() {
            return Err(CacheError::InvalidConfig(
                "at least one read-write endpoint is required".into(),
            ));
        }
        if self.max_write_pool_size == 0 || self.max_read_pool_size == 0 {
            return Err(CacheError::InvalidConfig(
                "pool sizes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Read-only endpoints, or the read-write set when none are configured.
    pub fn effective_read_hosts(&self) -> &[Endpoint] {
        if self.read_only_hosts.is_empty() {
            &self.read_write_hosts
        } else {
            &self.read_only_hosts
        }
    }
}

fn parse_number(name: &str, raw: Option<String>) -> CacheResult<Option<u64>> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| CacheError::InvalidConfig(format!("{name} must be a number, got {raw:?}"))),
        None => Ok(None),
    }
}
