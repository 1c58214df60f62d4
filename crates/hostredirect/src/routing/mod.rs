//! Host-based routing for inbound proxy connections
//!
//! This module resolves the virtual host a player connected with to a
//! registered backend server:
//! - Dynamic: custom domains assigned in the management panel (play.example.com)
//! - Suffix: label in front of a base domain (lobby.example.net)
//! - First label: first label of any host (lobby.anything.tld)

mod host;
mod host_resolver;
mod mapping;

pub use host::clear_virtual_host;
pub use host_resolver::{
    DynamicResolver, FirstLabelResolver, HostResolveError, HostResolver, ResolutionType,
    ResolvedServer, SuffixResolver,
};
pub use mapping::{HostServerMap, MappingBuilder, MappingReport, DEFAULT_FETCH_CONCURRENCY};
