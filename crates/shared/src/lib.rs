//! HostRedirect Shared Types
//!
//! Wire types and errors shared between the management API client and the
//! host resolvers.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
