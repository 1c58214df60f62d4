//! Server registry and connection seams
//!
//! The proxy runtime owns its registered servers and live connections. The
//! resolver only needs to look servers up and to hand a decision back, so
//! both sides are expressed as traits here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A backend server known to the proxy
pub trait RegisteredServer: Send + Sync + fmt::Debug {
    /// Name the server was registered under
    fn name(&self) -> &str;

    /// Network address as the proxy reports it
    fn address(&self) -> String;
}

/// Shared handle to a registered server
pub type ServerHandle = Arc<dyn RegisteredServer>;

/// Read-only view of the proxy's registered servers
pub trait ServerRegistry: Send + Sync {
    /// Look a server up by its registered name
    fn server(&self, name: &str) -> Option<ServerHandle>;

    /// All servers in registration order
    fn servers(&self) -> Vec<ServerHandle>;
}

/// A connection waiting for its initial backend
pub trait InitialServerSelection: Send {
    /// Virtual host as reported by the client, possibly decorated
    fn virtual_host(&self) -> String;

    fn username(&self) -> &str;

    fn set_initial_server(&mut self, server: ServerHandle);

    fn disconnect(&mut self, reason: &str);
}

/// Plain name/address pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    name: String,
    address: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl RegisteredServer for ServerInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

/// Fixed registry built once at startup
///
/// Names are matched case-insensitively; [`RegisteredServer::name`] keeps
/// the case it was registered with.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    servers: Vec<ServerHandle>,
    by_name: HashMap<String, usize>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server; a later registration under the same name replaces
    /// the earlier one in place
    pub fn register(&mut self, server: ServerHandle) {
        let key = server.name().to_lowercase();
        match self.by_name.get(&key) {
            Some(&index) => self.servers[index] = server,
            None => {
                self.by_name.insert(key, self.servers.len());
                self.servers.push(server);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl FromIterator<ServerInfo> for StaticRegistry {
    fn from_iter<I: IntoIterator<Item = ServerInfo>>(iter: I) -> Self {
        let mut registry = Self::new();
        for server in iter {
            registry.register(Arc::new(server));
        }
        registry
    }
}

impl ServerRegistry for StaticRegistry {
    fn server(&self, name: &str) -> Option<ServerHandle> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|&index| self.servers.get(index))
            .cloned()
    }

    fn servers(&self) -> Vec<ServerHandle> {
        self.servers.clone()
    }
}
