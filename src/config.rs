use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;

/// Server configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// sqlite URL for durable history. Unset keeps history in memory.
    pub database_url: Option<String>,
    /// How many recent messages a new connection gets. `None` is all of them.
    pub history_limit: Option<usize>,
    pub upload_dir: PathBuf,
    /// Prefix of the `fileUrl` handed back by `/upload`.
    pub public_url: String,
    /// CORS origin, `*` for any.
    pub allowed_origin: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let history_limit = match parse_var(&var, "HISTORY_LIMIT")?.unwrap_or(50) {
            0 => None,
            limit => Some(limit),
        };

        Ok(Self {
            bind_addr: parse_var(&var, "BIND_ADDR")?
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3001))),
            database_url: var("DATABASE_URL"),
            history_limit,
            upload_dir: var("UPLOAD_DIR").map_or_else(|| PathBuf::from("uploads"), PathBuf::from),
            public_url: var("PUBLIC_URL").unwrap_or_else(|| "http://localhost:3001".to_owned()),
            allowed_origin: var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_owned()),
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES")?.unwrap_or(10 * 1024 * 1024),
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|value| value.parse::<T>().with_context(|| format!("invalid {name}: {value:?}")))
        .transpose()
}
