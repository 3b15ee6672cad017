//! ragdb-core
//!
//! Shared domain types, collaborator traits, configuration, chunking and the
//! on-disk corpus layout used by the lexical, vector and hybrid crates.

#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;
