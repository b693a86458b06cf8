//! Command implementations for the sessync CLI.
//!
//! - `replay` - Scenario replay against the in-memory backend
//! - `config` - Configuration file management

pub(crate) mod config;
pub(crate) mod replay;

pub(crate) use config::*;
pub(crate) use replay::*;
