//! Host-to-server mapping built from the management API
//!
//! The map is rebuilt from scratch on every resolution and handed out as an
//! immutable value. Building never fails: a failed listing yields an empty
//! map and a failed per-server lookup drops only that server.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use hostredirect_shared::{ManagementError, ManagementResult, ServerDomain};

use crate::management::ManagementClient;

/// Default number of per-server lookups in flight at once
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Domain -> server identifier table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostServerMap {
    entries: HashMap<String, String>,
}

impl HostServerMap {
    /// Server identifier mapped to `host`, if any
    pub fn get(&self, host: &str) -> Option<&str> {
        self.entries.get(host).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Later pairs overwrite earlier ones with the same domain
impl FromIterator<(String, String)> for HostServerMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A built map plus what was left out of it
#[derive(Debug, Clone, Default)]
pub struct MappingReport {
    pub map: HostServerMap,
    /// Set when the server listing itself failed
    pub listing_error: Option<ManagementError>,
    /// Servers that did not make it into the map, with the reason
    pub skipped: Vec<(String, ManagementError)>,
}

impl MappingReport {
    /// True when the map may be missing entries because of a failure
    /// (as opposed to servers that simply have no domain)
    pub fn is_degraded(&self) -> bool {
        self.listing_error.is_some() || self.skipped.iter().any(|(_, e)| !e.is_unassigned())
    }
}

/// Aggregates listing and per-server domain lookups into a [`HostServerMap`]
#[derive(Clone)]
pub struct MappingBuilder {
    client: Arc<ManagementClient>,
    concurrency: usize,
}

impl MappingBuilder {
    pub fn new(client: Arc<ManagementClient>) -> Self {
        Self {
            client,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Limit the number of concurrent per-server lookups (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn client(&self) -> &ManagementClient {
        &self.client
    }

    /// Build the map, discarding failure details
    pub async fn build(&self) -> HostServerMap {
        self.build_report().await.map
    }

    /// Build the map and report which servers were skipped and why
    pub async fn build_report(&self) -> MappingReport {
        let servers = match self.client.list_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list servers, no host mapping available");
                return MappingReport {
                    listing_error: Some(e),
                    ..MappingReport::default()
                };
            }
        };

        let client = &self.client;
        // `buffered` keeps listing order, so collisions resolve deterministically
        let results: Vec<(String, ManagementResult<ServerDomain>)> = stream::iter(servers)
            .map(move |server| async move {
                let result = client.fetch_domain(&server.identifier).await;
                (server.identifier, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut entries: HashMap<String, String> = HashMap::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (server_id, result) in results {
            match result {
                Ok(ServerDomain { domain, .. }) => {
                    if let Some(previous) = entries.insert(domain.clone(), server_id.clone()) {
                        if previous != server_id {
                            tracing::warn!(
                                domain = %domain,
                                previous = %previous,
                                server = %server_id,
                                "Domain assigned to multiple servers, using the last one listed"
                            );
                        }
                    }
                }
                Err(e) if e.is_unassigned() => {
                    tracing::debug!(server = %server_id, "Server has no domain assigned");
                    skipped.push((server_id, e));
                }
                Err(e) => {
                    tracing::warn!(server = %server_id, error = %e, "Skipping server, domain lookup failed");
                    skipped.push((server_id, e));
                }
            }
        }

        tracing::debug!(
            mapped = entries.len(),
            skipped = skipped.len(),
            "Built host mapping"
        );

        MappingReport {
            map: HostServerMap { entries },
            listing_error: None,
            skipped,
        }
    }
}
