//! Scope sets, redacted secrets, and the authorization map carried by credentials.

pub mod scope;
pub mod secret;
pub mod token;

pub use scope::*;
pub use secret::*;
pub use token::*;
