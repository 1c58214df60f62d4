//! HostRedirect
//!
//! Picks the backend server for inbound proxy connections based on the
//! virtual host the player connected with.

pub mod config;
pub mod management;
pub mod registry;
pub mod router;
pub mod routing;

pub use config::{Config, ConfigError, ResolverMode};
pub use management::{Credentials, ManagementClient, Token, TokenCache};
pub use registry::{
    InitialServerSelection, RegisteredServer, ServerHandle, ServerInfo, ServerRegistry,
    StaticRegistry,
};
pub use router::{ConnectionRouter, RouteOutcome};
pub use routing::{
    clear_virtual_host, HostResolveError, HostResolver, HostServerMap, MappingBuilder,
    ResolvedServer,
};
