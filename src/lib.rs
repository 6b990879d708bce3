//! Bundlekeeper - background update service for versioned bundles
//!
//! Keeps a local cache of `<bundle>@<version>.<ext>` artifacts fresh by
//! polling a bundle repository in round-robin order, and answers on-demand
//! requests from the cache with at most one fetch in flight per bundle.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetch;
pub mod network;
pub mod scheduler;
pub mod seed;
pub mod service;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BundleError, BundleResult};
