//! Application configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::management::Credentials;
use crate::registry::ServerInfo;

/// Which host resolver strategy is active for this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    /// Domains fetched from the management API
    Dynamic,
    /// Server name is the label in front of the configured base domain
    Suffix,
    /// Server name is the first label of the host
    FirstLabel,
}

impl FromStr for ResolverMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" | "api" => Ok(ResolverMode::Dynamic),
            "suffix" | "subdomain" => Ok(ResolverMode::Suffix),
            "first-label" | "first_label" | "label" => Ok(ResolverMode::FirstLabel),
            other => Err(ConfigError::Invalid {
                var: "HOSTREDIRECT_MODE",
                reason: format!("unknown resolver mode '{}'", other),
            }),
        }
    }
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: ResolverMode,

    // Management API (dynamic mode)
    pub credentials: Option<Credentials>,

    // Static modes
    pub base_domain: Option<String>,

    // Timeouts
    pub request_timeout_ms: u64,
    pub resolve_timeout_ms: u64,

    // Mapping build
    pub fetch_concurrency: usize,
    pub token_expiry_margin_secs: u64,

    // Static server registry used by the diagnostic binary
    pub servers: Vec<ServerInfo>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode: ResolverMode = env::var("HOSTREDIRECT_MODE")
            .unwrap_or_else(|_| "dynamic".to_string())
            .parse()?;

        let credentials = match mode {
            ResolverMode::Dynamic => Some(credentials_from_env()?),
            ResolverMode::Suffix | ResolverMode::FirstLabel => None,
        };

        let base_domain = env::var("HOSTREDIRECT_BASE_DOMAIN")
            .ok()
            .map(|d| d.trim().trim_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty());
        if mode == ResolverMode::Suffix && base_domain.is_none() {
            return Err(ConfigError::Missing("HOSTREDIRECT_BASE_DOMAIN"));
        }

        Ok(Self {
            mode,
            credentials,
            base_domain,

            request_timeout_ms: env::var("HOSTREDIRECT_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse::<u64>()
                .unwrap_or(10000)
                .max(1),
            resolve_timeout_ms: env::var("HOSTREDIRECT_RESOLVE_TIMEOUT_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse::<u64>()
                .unwrap_or(15000)
                .max(1),

            fetch_concurrency: env::var("HOSTREDIRECT_FETCH_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse::<usize>()
                .unwrap_or(8)
                .max(1),
            token_expiry_margin_secs: env::var("HOSTREDIRECT_TOKEN_EXPIRY_MARGIN_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),

            servers: parse_servers(&env::var("HOSTREDIRECT_SERVERS").unwrap_or_default())?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn token_expiry_margin(&self) -> Duration {
        Duration::from_secs(self.token_expiry_margin_secs)
    }
}

fn credentials_from_env() -> Result<Credentials, ConfigError> {
    let raw_url =
        env::var("HOSTREDIRECT_URL").map_err(|_| ConfigError::Missing("HOSTREDIRECT_URL"))?;
    let base_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
        var: "HOSTREDIRECT_URL",
        reason: e.to_string(),
    })?;
    if base_url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            var: "HOSTREDIRECT_URL",
            reason: "URL cannot be used as a base".to_string(),
        });
    }

    let client_id = env::var("HOSTREDIRECT_CLIENTID")
        .map_err(|_| ConfigError::Missing("HOSTREDIRECT_CLIENTID"))?;
    let client_secret = env::var("HOSTREDIRECT_CLIENTSECRET")
        .map_err(|_| ConfigError::Missing("HOSTREDIRECT_CLIENTSECRET"))?;

    Ok(Credentials::new(base_url, client_id, client_secret))
}

/// Parse `name=address` pairs separated by commas
pub fn parse_servers(raw: &str) -> Result<Vec<ServerInfo>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, address)) if !name.trim().is_empty() && !address.trim().is_empty() => {
                Ok(ServerInfo::new(name.trim(), address.trim()))
            }
            _ => Err(ConfigError::Invalid {
                var: "HOSTREDIRECT_SERVERS",
                reason: format!("expected name=address, got '{}'", entry),
            }),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegisteredServer;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "HOSTREDIRECT_MODE",
        "HOSTREDIRECT_URL",
        "HOSTREDIRECT_CLIENTID",
        "HOSTREDIRECT_CLIENTSECRET",
        "HOSTREDIRECT_BASE_DOMAIN",
        "HOSTREDIRECT_REQUEST_TIMEOUT_MS",
        "HOSTREDIRECT_RESOLVE_TIMEOUT_MS",
        "HOSTREDIRECT_FETCH_CONCURRENCY",
        "HOSTREDIRECT_TOKEN_EXPIRY_MARGIN_SECS",
        "HOSTREDIRECT_SERVERS",
    ];

    /// Helper to clear env vars before and after tests
    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn setup_dynamic_config() {
        env::set_var("HOSTREDIRECT_URL", "https://panel.example.com");
        env::set_var("HOSTREDIRECT_CLIENTID", "gate");
        env::set_var("HOSTREDIRECT_CLIENTSECRET", "super-secret");
    }

    #[test]
    #[serial(env)]
    fn test_dynamic_defaults() {
        cleanup_config();
        setup_dynamic_config();

        let config = Config::from_env().unwrap();
        assert_eq!(config.mode, ResolverMode::Dynamic);
        assert_eq!(config.request_timeout_ms, 10000);
        assert_eq!(config.resolve_timeout_ms, 15000);
        assert_eq!(config.fetch_concurrency, 8);
        assert_eq!(config.token_expiry_margin_secs, 0);
        assert!(config.servers.is_empty());

        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.client_id(), "gate");
        assert_eq!(credentials.base_url().host_str(), Some("panel.example.com"));

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_dynamic_requires_credentials() {
        cleanup_config();
        env::set_var("HOSTREDIRECT_URL", "https://panel.example.com");

        match Config::from_env() {
            Err(ConfigError::Missing("HOSTREDIRECT_CLIENTID")) => {}
            other => panic!("Expected Missing HOSTREDIRECT_CLIENTID, got: {:?}", other),
        }

        env::set_var("HOSTREDIRECT_CLIENTID", "gate");
        env::set_var("HOSTREDIRECT_CLIENTSECRET", "super-secret");
        env::set_var("HOSTREDIRECT_URL", "not a url");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { var: "HOSTREDIRECT_URL", .. })
        ));

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_suffix_requires_base_domain() {
        cleanup_config();
        env::set_var("HOSTREDIRECT_MODE", "suffix");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("HOSTREDIRECT_BASE_DOMAIN"))
        ));

        env::set_var("HOSTREDIRECT_BASE_DOMAIN", ".Example.NET.");
        let config = Config::from_env().unwrap();
        assert_eq!(config.mode, ResolverMode::Suffix);
        assert_eq!(config.base_domain.as_deref(), Some("example.net"));
        assert!(config.credentials.is_none());

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_unknown_mode_rejected() {
        cleanup_config();
        env::set_var("HOSTREDIRECT_MODE", "round-robin");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { var: "HOSTREDIRECT_MODE", .. })
        ));

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_numeric_overrides_and_floor() {
        cleanup_config();
        env::set_var("HOSTREDIRECT_MODE", "first-label");
        env::set_var("HOSTREDIRECT_FETCH_CONCURRENCY", "0");
        env::set_var("HOSTREDIRECT_TOKEN_EXPIRY_MARGIN_SECS", "5");
        env::set_var("HOSTREDIRECT_REQUEST_TIMEOUT_MS", "garbage");

        let config = Config::from_env().unwrap();
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.token_expiry_margin(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_millis(10000));

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_zero_timeouts_floored() {
        cleanup_config();
        env::set_var("HOSTREDIRECT_MODE", "first-label");
        env::set_var("HOSTREDIRECT_RESOLVE_TIMEOUT_MS", "0");
        env::set_var("HOSTREDIRECT_REQUEST_TIMEOUT_MS", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.resolve_timeout(), Duration::from_millis(1));
        assert_eq!(config.request_timeout(), Duration::from_millis(1));

        cleanup_config();
    }

    #[test]
    fn test_parse_servers() {
        let servers = parse_servers(" lobby=10.0.0.1:25565 , survival=srv-1,").unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name(), "lobby");
        assert_eq!(servers[0].address(), "10.0.0.1:25565");
        assert_eq!(servers[1].address(), "srv-1");

        assert!(parse_servers("").unwrap().is_empty());
        assert!(parse_servers("lobby").is_err());
        assert!(parse_servers("=srv-1").is_err());
    }

    #[test]
    fn test_resolver_mode_parse() {
        assert_eq!("Dynamic".parse::<ResolverMode>().unwrap(), ResolverMode::Dynamic);
        assert_eq!("suffix".parse::<ResolverMode>().unwrap(), ResolverMode::Suffix);
        assert_eq!(
            "first_label".parse::<ResolverMode>().unwrap(),
            ResolverMode::FirstLabel
        );
        assert!("other".parse::<ResolverMode>().is_err());
    }
}
