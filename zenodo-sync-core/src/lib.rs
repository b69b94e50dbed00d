#![doc = "zenodo-sync-core: core logic library for zenodo-sync."]

//! This crate contains the reconciliation and versioning logic, the catalog
//! data models, and the remote-client contract for zenodo-sync. The HTTP
//! client and CLI harness live in the `zenodo-sync` binary crate.
//!
//! # Usage
//! Add this as a dependency for all shared reconciliation, model, config,
//! and checksum code.

pub mod checksum;
pub mod config;
pub mod contract;
pub mod models;
pub mod reconcile;
