#![doc = "zenodo-sync: CLI harness around the zenodo-sync-core reconciliation logic."]

//! The binary crate owns everything outside the core decision logic: the
//! clap CLI surface, JSON catalog I/O, and the real HTTP deposit client.

pub mod catalog;
pub mod cli;
pub mod client;
