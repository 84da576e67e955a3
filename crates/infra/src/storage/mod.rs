//! Filesystem persistence adapters

pub mod offline_store;
pub mod token_store;
