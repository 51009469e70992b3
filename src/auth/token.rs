//! Identity tokens and the redacted secret they carry.

pub mod identity;
pub mod secret;
