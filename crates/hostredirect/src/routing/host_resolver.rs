//! Host-to-Server Resolution
//!
//! Resolves the virtual host of an inbound connection to a registered server.
//! Three strategies, one active per deployment:
//! - Dynamic: play.example.com -> domain assigned in the panel -> server identifier
//!   -> registered server whose address equals the identifier
//! - Suffix: lobby.example.net (base example.net) -> server named "lobby"
//! - First label: lobby.anything.tld -> server named "lobby"

use std::sync::Arc;
use std::time::Duration;

use super::{clear_virtual_host, MappingBuilder};
use crate::config::{Config, ConfigError, ResolverMode};
use crate::management::ManagementClient;
use crate::registry::{ServerHandle, ServerRegistry};

/// Result of resolving a host to a server
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub server: ServerHandle,
    /// The key that matched: a server identifier (dynamic) or a server name
    pub key: String,
    pub resolution_type: ResolutionType,
}

/// How the host was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionType {
    /// Matched a custom domain assigned in the management panel
    CustomDomain,
    /// Matched the label in front of the base domain
    Subdomain,
    /// Matched the first label of the host
    FirstLabel,
}

/// Resolve a virtual host against a server registry
pub enum HostResolver {
    Dynamic(DynamicResolver),
    Suffix(SuffixResolver),
    FirstLabel(FirstLabelResolver),
}

impl HostResolver {
    /// Build the strategy selected by the configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match config.mode {
            ResolverMode::Dynamic => {
                let credentials = config
                    .credentials
                    .clone()
                    .ok_or(ConfigError::Missing("HOSTREDIRECT_URL"))?;
                let client = ManagementClient::new(credentials, config.request_timeout())
                    .map_err(|e| ConfigError::HttpClient(e.to_string()))?
                    .with_token_expiry_margin(config.token_expiry_margin());
                let mappings = MappingBuilder::new(Arc::new(client))
                    .with_concurrency(config.fetch_concurrency);
                Ok(HostResolver::Dynamic(DynamicResolver::new(mappings)))
            }
            ResolverMode::Suffix => {
                let base_domain = config
                    .base_domain
                    .as_deref()
                    .ok_or(ConfigError::Missing("HOSTREDIRECT_BASE_DOMAIN"))?;
                Ok(HostResolver::Suffix(SuffixResolver::new(base_domain)))
            }
            ResolverMode::FirstLabel => Ok(HostResolver::FirstLabel(FirstLabelResolver)),
        }
    }

    /// Resolve a host to a registered server
    ///
    /// The host is cleared first, so callers may pass it as reported by the
    /// client.
    pub async fn resolve(
        &self,
        host: &str,
        registry: &dyn ServerRegistry,
    ) -> Result<ResolvedServer, HostResolveError> {
        let host = clear_virtual_host(host);
        match self {
            HostResolver::Dynamic(resolver) => resolver.resolve(&host, registry).await,
            HostResolver::Suffix(resolver) => resolver.resolve(&host, registry),
            HostResolver::FirstLabel(resolver) => resolver.resolve(&host, registry),
        }
    }
}

/// Looks hosts up in a mapping rebuilt from the management API
pub struct DynamicResolver {
    mappings: MappingBuilder,
}

impl DynamicResolver {
    pub fn new(mappings: MappingBuilder) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &MappingBuilder {
        &self.mappings
    }

    pub async fn resolve(
        &self,
        host: &str,
        registry: &dyn ServerRegistry,
    ) -> Result<ResolvedServer, HostResolveError> {
        let report = self.mappings.build_report().await;

        let server_id = match report.map.get(host) {
            Some(server_id) => server_id.to_string(),
            None => {
                return Err(match report.listing_error {
                    Some(e) => HostResolveError::Unavailable(e.to_string()),
                    None => HostResolveError::NoMapping(host.to_string()),
                });
            }
        };

        // Identifiers are matched against the address the proxy registered
        // the server with; first match wins
        let server = registry
            .servers()
            .into_iter()
            .find(|s| s.address() == server_id)
            .ok_or_else(|| HostResolveError::UnregisteredServer {
                host: host.to_string(),
                server_id: server_id.clone(),
            })?;

        Ok(ResolvedServer {
            server,
            key: server_id,
            resolution_type: ResolutionType::CustomDomain,
        })
    }
}

/// Takes the part of the host in front of `.<base domain>` as server name
#[derive(Debug, Clone)]
pub struct SuffixResolver {
    base_domain: String,
    suffix: String,
}

impl SuffixResolver {
    pub fn new(base_domain: &str) -> Self {
        let base_domain = base_domain.trim_matches('.').to_ascii_lowercase();
        Self {
            suffix: format!(".{}", base_domain),
            base_domain,
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Server name for a cleared host, split at the first `.<base domain>`
    pub fn server_key<'a>(&self, host: &'a str) -> Option<&'a str> {
        host.find(&self.suffix)
            .map(|index| &host[..index])
            .filter(|key| !key.is_empty())
    }

    pub fn resolve(
        &self,
        host: &str,
        registry: &dyn ServerRegistry,
    ) -> Result<ResolvedServer, HostResolveError> {
        let key = self
            .server_key(host)
            .ok_or_else(|| HostResolveError::NoSplit(host.to_string()))?;
        lookup_by_name(key, registry, ResolutionType::Subdomain)
    }
}

/// Takes the first label of the host as server name
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLabelResolver;

impl FirstLabelResolver {
    pub fn server_key<'a>(&self, host: &'a str) -> Option<&'a str> {
        host.split_once('.')
            .map(|(label, _)| label)
            .filter(|label| !label.is_empty())
    }

    pub fn resolve(
        &self,
        host: &str,
        registry: &dyn ServerRegistry,
    ) -> Result<ResolvedServer, HostResolveError> {
        let key = self
            .server_key(host)
            .ok_or_else(|| HostResolveError::NoSplit(host.to_string()))?;
        lookup_by_name(key, registry, ResolutionType::FirstLabel)
    }
}

fn lookup_by_name(
    name: &str,
    registry: &dyn ServerRegistry,
    resolution_type: ResolutionType,
) -> Result<ResolvedServer, HostResolveError> {
    let server = registry
        .server(name)
        .ok_or_else(|| HostResolveError::UnknownServer(name.to_string()))?;
    Ok(ResolvedServer {
        server,
        key: name.to_string(),
        resolution_type,
    })
}

/// Errors that can occur during host resolution
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HostResolveError {
    #[error("No server mapping for host: {0}")]
    NoMapping(String),

    #[error("Server not found: {server_id}")]
    UnregisteredServer { host: String, server_id: String },

    #[error("No server name in host: {0}")]
    NoSplit(String),

    #[error("Server not found: {0}")]
    UnknownServer(String),

    #[error("Server mapping unavailable: {0}")]
    Unavailable(String),

    #[error("Server lookup timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Connection closed during server lookup")]
    Cancelled,
}

impl HostResolveError {
    /// Stable short code for logs
    pub fn reason(&self) -> &'static str {
        match self {
            HostResolveError::NoMapping(_) => "no-mapping",
            HostResolveError::UnregisteredServer { .. } => "unregistered",
            HostResolveError::NoSplit(_) => "no-split",
            HostResolveError::UnknownServer(_) => "unknown-server",
            HostResolveError::Unavailable(_) => "unavailable",
            HostResolveError::TimedOut(_) => "timeout",
            HostResolveError::Cancelled => "cancelled",
        }
    }

    /// True when resolution completed and simply found no server, false for
    /// resolver-internal failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HostResolveError::NoMapping(_)
                | HostResolveError::UnregisteredServer { .. }
                | HostResolveError::NoSplit(_)
                | HostResolveError::UnknownServer(_)
        )
    }
}
