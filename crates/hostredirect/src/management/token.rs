//! Client-credentials token cache
//!
//! Holds a single access token for the process. Renewal is serialized behind
//! an async mutex: the first caller that finds the token missing or expired
//! performs the exchange while concurrent callers wait and then reuse the
//! fresh token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hostredirect_shared::{ManagementError, ManagementResult, TokenResponse};
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{snippet, Credentials};

/// Upper bound on the lifetime we accept from the token endpoint (one year)
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// An access token and the instant it stops being valid
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    token_type: String,
    expires_at: Instant,
}

impl Token {
    /// Build a token from an exchange response received at `received_at`
    pub fn issued(response: TokenResponse, received_at: Instant) -> Self {
        let lifetime = Duration::from_secs(response.expires_in).min(MAX_TOKEN_LIFETIME);
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at: received_at + lifetime,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// True while `now + margin` is strictly before the expiry instant
    pub fn is_valid_at(&self, now: Instant, margin: Duration) -> bool {
        match now.checked_add(margin) {
            Some(deadline) => deadline < self.expires_at,
            None => false,
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Process-wide token holder with single-flight renewal
pub struct TokenCache {
    http: Client,
    credentials: Credentials,
    /// Treat a token as expired this long before its real expiry
    margin: Duration,
    token: Mutex<Option<Token>>,
    exchanges: AtomicU64,
}

impl TokenCache {
    pub fn new(http: Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            margin: Duration::ZERO,
            token: Mutex::new(None),
            exchanges: AtomicU64::new(0),
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Return a valid token, exchanging credentials only when the cached one
    /// is missing or expired
    ///
    /// On failure the previously cached token (if any) is left as it was.
    pub async fn ensure_valid(&self) -> ManagementResult<Token> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Instant::now(), self.margin) {
                return Ok(token.clone());
            }
            tracing::debug!("Access token expired, renewing");
        }

        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Number of credential exchanges that completed successfully
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    async fn exchange(&self) -> ManagementResult<Token> {
        let url = self
            .credentials
            .endpoint(&["oauth2", "token"])
            .ok_or_else(|| ManagementError::Auth("base URL cannot carry a path".to_string()))?;

        let response = self
            .http
            .post(url)
            .form(&[
                ("client_id", self.credentials.client_id()),
                ("client_secret", self.credentials.client_secret()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| ManagementError::Auth(format!("executing token request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Token endpoint rejected client credentials");
            return Err(ManagementError::Auth(format!(
                "token endpoint returned {}: {}",
                status,
                snippet(&body)
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ManagementError::Auth(format!("decoding token response: {}", e)))?;

        let token = Token::issued(body, Instant::now());
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            client_id = %self.credentials.client_id(),
            token_type = %token.token_type,
            "Obtained management API access token"
        );

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use url::Url;

    fn cache_for(server: &mockito::Server) -> TokenCache {
        let credentials =
            Credentials::new(Url::parse(&server.url()).unwrap(), "gate", "s3cret");
        TokenCache::new(Client::new(), credentials)
    }

    fn token_body(access_token: &str, expires_in: u64) -> String {
        format!(
            r#"{{"access_token":"{}","token_type":"Bearer","expires_in":{}}}"#,
            access_token, expires_in
        )
    }

    #[test]
    fn test_token_validity_is_strict() {
        let now = Instant::now();
        let token = Token::issued(
            TokenResponse {
                access_token: "abc".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 60,
            },
            now,
        );

        assert_eq!(token.expires_at(), now + Duration::from_secs(60));
        assert!(token.is_valid_at(now, Duration::ZERO));
        assert!(token.is_valid_at(now + Duration::from_secs(59), Duration::ZERO));
        assert!(!token.is_valid_at(now + Duration::from_secs(60), Duration::ZERO));
        assert!(!token.is_valid_at(now + Duration::from_secs(55), Duration::from_secs(5)));
        assert_eq!(token.authorization(), "Bearer abc");
    }

    #[test]
    fn test_huge_lifetime_is_capped() {
        let now = Instant::now();
        let token = Token::issued(
            TokenResponse {
                access_token: "abc".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: u64::MAX,
            },
            now,
        );
        assert_eq!(token.expires_at(), now + MAX_TOKEN_LIFETIME);
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let token = Token::issued(
            TokenResponse {
                access_token: "very-secret".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 60,
            },
            Instant::now(),
        );
        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_exchange_sends_client_credentials_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "gate".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("abc", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = cache_for(&server);
        let before = Instant::now();
        let token = cache.ensure_valid().await.unwrap();
        let after = Instant::now();

        assert_eq!(token.access_token(), "abc");
        assert_eq!(token.token_type(), "Bearer");
        assert!(token.expires_at() >= before + Duration::from_secs(3600));
        assert!(token.expires_at() <= after + Duration::from_secs(3600));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_valid_token_is_reused() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(token_body("abc", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = cache_for(&server);
        let first = cache.ensure_valid().await.unwrap();
        let second = cache.ensure_valid().await.unwrap();
        let third = cache.ensure_valid().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(cache.exchange_count(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_renewed() {
        let mut server = mockito::Server::new_async().await;
        // expires_in 0 means the token is already expired on the next check
        let mock = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(token_body("short-lived", 0))
            .expect(2)
            .create_async()
            .await;

        let cache = cache_for(&server);
        cache.ensure_valid().await.unwrap();
        cache.ensure_valid().await.unwrap();

        assert_eq!(cache.exchange_count(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_margin_forces_early_renewal() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(token_body("abc", 30))
            .expect(2)
            .create_async()
            .await;

        let cache = cache_for(&server).with_margin(Duration::from_secs(60));
        cache.ensure_valid().await.unwrap();
        cache.ensure_valid().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_auth_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let cache = cache_for(&server);
        let err = cache.ensure_valid().await.unwrap_err();
        assert!(matches!(err, ManagementError::Auth(ref msg) if msg.contains("401")));
        assert_eq!(cache.exchange_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let cache = cache_for(&server);
        assert!(matches!(
            cache.ensure_valid().await,
            Err(ManagementError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_renewal_keeps_previous_token() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(token_body("first", 0))
            .expect(1)
            .create_async()
            .await;

        let cache = cache_for(&server);
        let first = cache.ensure_valid().await.unwrap();
        ok.assert_async().await;
        ok.remove_async().await;

        server
            .mock("POST", "/oauth2/token")
            .with_status(503)
            .create_async()
            .await;

        assert!(cache.ensure_valid().await.is_err());
        let cached = cache.token.lock().await.clone();
        assert_eq!(cached, Some(first));
    }
}
