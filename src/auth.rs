//! Audience identifiers and identity token models.

pub mod audience;
pub mod token;

pub use audience::*;
pub use token::{identity::*, secret::*};
