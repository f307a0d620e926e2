//! Shared fixtures for the FerroVault integration tests
//!
//! The helpers here build source trees, seed file contents and inspect what a
//! storage provider ended up holding after a run.

pub mod test_utils;
