//! Interactive consent flows.

mod installed;
mod session;

pub use installed::*;
pub use session::{AuthorizationSession, PkceCodeChallengeMethod};
