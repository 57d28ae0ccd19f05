//! Refresh-token record model and redacting secret wrapper.

pub mod record;
pub mod secret;

pub use record::*;
pub use secret::*;
