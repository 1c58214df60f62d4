//! Authenticated calls against the server management API

use std::time::Duration;

use hostredirect_shared::{
    ManagementError, ManagementResult, ServerData, ServerDomain, ServerListing, ServerSummary,
};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::{snippet, Credentials, Token, TokenCache};
use crate::routing::clear_virtual_host;

/// Client for the server listing and per-server metadata endpoints
pub struct ManagementClient {
    http: Client,
    credentials: Credentials,
    tokens: TokenCache,
}

impl ManagementClient {
    /// Create a client whose requests time out after `request_timeout`
    pub fn new(credentials: Credentials, request_timeout: Duration) -> ManagementResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ManagementError::Api(format!("building HTTP client: {}", e)))?;

        Ok(Self::with_http_client(http, credentials))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_http_client(http: Client, credentials: Credentials) -> Self {
        let tokens = TokenCache::new(http.clone(), credentials.clone());
        Self {
            http,
            credentials,
            tokens,
        }
    }

    /// Renew tokens this long before they actually expire
    pub fn with_token_expiry_margin(mut self, margin: Duration) -> Self {
        self.tokens = self.tokens.with_margin(margin);
        self
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub async fn ensure_token(&self) -> ManagementResult<Token> {
        self.tokens.ensure_valid().await
    }

    /// List every server visible to the service account
    pub async fn list_servers(&self) -> ManagementResult<Vec<ServerSummary>> {
        let listing: ServerListing = self.get_json(&["api", "servers"]).await?;
        Ok(listing.into_servers())
    }

    /// Fetch the routing domain assigned to one server
    ///
    /// An empty or missing domain is reported as
    /// [`ManagementError::NoDomainAssigned`].
    pub async fn fetch_domain(&self, server_id: &str) -> ManagementResult<ServerDomain> {
        let data: ServerData = self
            .get_json(&["api", "servers", server_id, "data"])
            .await?;

        let domain = clear_virtual_host(data.domain());
        if domain.is_empty() {
            return Err(ManagementError::NoDomainAssigned(server_id.to_string()));
        }

        Ok(ServerDomain {
            server_identifier: server_id.to_string(),
            domain,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> ManagementResult<T> {
        let token = self.ensure_token().await?;

        let url = self
            .credentials
            .endpoint(segments)
            .ok_or_else(|| ManagementError::Api("base URL cannot carry a path".to_string()))?;
        let path = url.path().to_string();

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, token.authorization())
            .send()
            .await
            .map_err(|e| ManagementError::Api(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ManagementError::Api(format!(
                "GET {} returned {}: {}",
                path,
                status,
                snippet(&body)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ManagementError::Api(format!("decoding GET {} response: {}", path, e)))
    }
}
