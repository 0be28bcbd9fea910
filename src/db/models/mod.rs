//! Database models split into domain-specific modules.

pub mod admin;
pub mod contact;
pub mod document;

pub use admin::*;
pub use contact::*;
pub use document::*;
