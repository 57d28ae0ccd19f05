//! Auth-domain identifiers, access-token claims, session state, and token models.

pub mod claims;
pub mod id;
pub mod session;
pub mod token;

pub use claims::*;
pub use id::*;
pub use session::*;
pub use token::{record::*, secret::*};
