//! Server management API client
//!
//! Talks to the panel that owns the server list. Every call is authenticated
//! with a client-credentials token held by [`TokenCache`].

mod client;
mod token;

use std::fmt;

use url::Url;

pub use client::ManagementClient;
pub use token::{Token, TokenCache};

/// Service credentials for the management API
#[derive(Clone)]
pub struct Credentials {
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(base_url: Url, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Append path segments to the base URL, percent-encoding each one
    ///
    /// Returns None when the base URL cannot carry a path (e.g. `mailto:`).
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Shorten a response body for log and error messages
pub(crate) fn snippet(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
