//! Initial server selection for inbound connections
//!
//! Invoked once per connection when the proxy needs a first backend. Either
//! assigns the resolved server or disconnects the player with the reason.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigError};
use crate::registry::{InitialServerSelection, ServerRegistry};
use crate::routing::{clear_virtual_host, HostResolveError, HostResolver};

/// Default upper bound for one resolution (15 seconds)
const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// What the router decided for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The connection was assigned to the named server
    Assigned { server: String },
    /// No server was assigned
    Refused(HostResolveError),
}

impl RouteOutcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, RouteOutcome::Assigned { .. })
    }
}

/// Routes connections to servers using the configured [`HostResolver`]
pub struct ConnectionRouter {
    resolver: HostResolver,
    registry: Arc<dyn ServerRegistry>,
    resolve_timeout: Duration,
}

impl ConnectionRouter {
    pub fn new(resolver: HostResolver, registry: Arc<dyn ServerRegistry>) -> Self {
        Self {
            resolver,
            registry,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Build the router for the resolver mode selected in `config`
    pub fn from_config(
        config: &Config,
        registry: Arc<dyn ServerRegistry>,
    ) -> Result<Self, ConfigError> {
        let resolver = HostResolver::from_config(config)?;
        Ok(Self::new(resolver, registry).with_resolve_timeout(config.resolve_timeout()))
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn resolver(&self) -> &HostResolver {
        &self.resolver
    }

    /// Choose the initial server for `conn`
    ///
    /// Never fails: every resolver error, timeout or panic ends up as
    /// [`RouteOutcome::Refused`]. Cancelling `cancel` abandons in-flight
    /// lookups; a cancelled connection is not sent a disconnect notice.
    pub async fn route<C>(&self, conn: &mut C, cancel: &CancellationToken) -> RouteOutcome
    where
        C: InitialServerSelection + ?Sized,
    {
        let host = clear_virtual_host(&conn.virtual_host());

        let resolution =
            AssertUnwindSafe(self.resolver.resolve(&host, self.registry.as_ref())).catch_unwind();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HostResolveError::Cancelled),
            outcome = tokio::time::timeout(self.resolve_timeout, resolution) => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(HostResolveError::Unavailable("resolver panicked".to_string())),
                Err(_) => Err(HostResolveError::TimedOut(self.resolve_timeout)),
            },
        };

        match result {
            Ok(resolved) => {
                let server = resolved.server.name().to_string();
                tracing::info!(
                    username = %conn.username(),
                    host = %host,
                    server = %server,
                    key = %resolved.key,
                    resolution = ?resolved.resolution_type,
                    "Redirecting player"
                );
                conn.set_initial_server(resolved.server);
                RouteOutcome::Assigned { server }
            }
            Err(HostResolveError::Cancelled) => {
                tracing::debug!(host = %host, "Connection gone before server lookup finished");
                RouteOutcome::Refused(HostResolveError::Cancelled)
            }
            Err(e) => {
                // Internal failures can carry management API bodies; players only see the host
                let reason = if e.is_not_found() {
                    tracing::info!(host = %host, reason = e.reason(), error = %e, "No server for host");
                    e.to_string()
                } else {
                    tracing::warn!(host = %host, reason = e.reason(), error = %e, "Server lookup failed");
                    format!("Server lookup failed for host: {}", host)
                };
                conn.disconnect(&reason);
                RouteOutcome::Refused(e)
            }
        }
    }
}
