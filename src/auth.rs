//! Auth-domain identifiers, scope lists, and id-token claims.

pub mod claims;
pub mod id;
pub mod scope;

pub use claims::*;
pub use id::*;
pub use scope::*;
