//! Auth-domain credentials, access-token secrets, and user payloads.

pub mod credentials;
pub mod token;

pub use credentials::*;
pub use token::*;
