//! Command-line arguments for the `authgate` and `authgate-jwtgen` binaries.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use authgate_authn::{AuthConfig, ConfigError, config};
use clap::Parser;

/// Delegated authorization endpoint for reverse proxies.
///
/// Verifies the bearer token in `Authorization` against the services file
/// and checks `X-Original-URI` against the service's allowed paths.
#[derive(Debug, Clone, Parser)]
#[command(name = "authgate", version, about)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "AUTHGATE_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Path to the services file.
    #[arg(long = "conf", env = "AUTHGATE_CONF")]
    pub conf: PathBuf,

    /// Load and validate the services file, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum token age measured from its `iat` claim.
    #[arg(
        long,
        env = "AUTHGATE_JWT_FRESHNESS",
        default_value = "1h",
        value_parser = humantime::parse_duration
    )]
    pub jwt_freshness: Duration,

    /// Path segment the auth-request endpoint is served on.
    #[arg(long, env = "AUTHGATE_AUTH_ENDPOINT", default_value = "auth")]
    pub auth_endpoint: String,

    /// Verification cache capacity; 0 disables caching.
    #[arg(long, env = "AUTHGATE_CACHE_SIZE", default_value_t = config::DEFAULT_CACHE_SIZE)]
    pub cache_size: usize,

    /// Entries evicted at once when the cache is full.
    #[arg(long, env = "AUTHGATE_PRUNE_SIZE", default_value_t = config::DEFAULT_PRUNE_SIZE)]
    pub prune_size: usize,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "AUTHGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "AUTHGATE_LOG_JSON")]
    pub log_json: bool,
}

impl ServeArgs {
    /// Builds validated verification tunables from the flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] for out-of-range values.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        AuthConfig::builder()
            .freshness(self.jwt_freshness)
            .cache_size(self.cache_size)
            .prune_size(self.prune_size)
            .build()
    }
}

/// Issues a signed bearer token for a registered service.
#[derive(Debug, Clone, Parser)]
#[command(name = "authgate-jwtgen", version, about)]
pub struct JwtgenArgs {
    /// PEM private key (RSA or EC P-256).
    #[arg(long)]
    pub private_key: PathBuf,

    /// Service id written to the `sub` claim.
    #[arg(long, default_value = "private-key-user")]
    pub subject: String,

    /// Token lifetime, written as `exp = iat + max_age`.
    #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
    pub max_age: Duration,

    /// Value of the `iss` claim.
    #[arg(long, default_value = "authgate-jwtgen")]
    pub issuer: String,
}
