//! Wire types exchanged with the server management API

use serde::{Deserialize, Serialize};

// =============================================================================
// OAuth2
// =============================================================================

/// Body of a successful client-credentials token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, relative to the moment the response was received
    pub expires_in: u64,
}

// =============================================================================
// Servers
// =============================================================================

/// One entry of the server listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub identifier: String,
}

/// Server listing as returned by `GET /api/servers`
///
/// Older panels answer with a bare array, newer ones wrap the array in a
/// paged envelope. Both shapes decode here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServerListing {
    Bare(Vec<ServerSummary>),
    Paged {
        servers: Vec<ServerSummary>,
        #[serde(default)]
        paging: Option<serde_json::Value>,
    },
}

impl ServerListing {
    pub fn into_servers(self) -> Vec<ServerSummary> {
        match self {
            ServerListing::Bare(servers) => servers,
            ServerListing::Paged { servers, .. } => servers,
        }
    }
}

/// Body of `GET /api/servers/{identifier}/data`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerData {
    #[serde(default)]
    pub data: ServerDataFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerDataFields {
    #[serde(rename = "gate.hostredirect.domain", default)]
    pub domain: Option<DataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataValue {
    #[serde(default)]
    pub value: String,
}

impl ServerData {
    /// The assigned domain, empty when the key is absent or unset
    pub fn domain(&self) -> &str {
        self.data
            .domain
            .as_ref()
            .map(|d| d.value.as_str())
            .unwrap_or_default()
    }
}

/// A server together with the domain currently routed to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDomain {
    pub server_identifier: String,
    pub domain: String,
}
