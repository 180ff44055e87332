//! CLI command handlers
//!
//! # Modules
//!
//! - `run`: first run, lock and unlock against the filesystem baseline store

pub mod run;
