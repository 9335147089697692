//! Schema module - configuration types for rendering-configuration search.

mod config;
mod search;

pub use config::*;
pub use search::*;
