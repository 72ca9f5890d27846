//! Credential resolution for connection records.
//!
//! Resolution happens freshly for every session; nothing is cached across
//! operations. The fallback order is fixed:
//!
//! 1. Explicit private key path (the file must exist)
//! 2. Explicit password
//! 3. Default key files in the user's SSH directory

mod credential;
mod resolver;

pub use credential::Credential;
pub use resolver::AuthResolver;
