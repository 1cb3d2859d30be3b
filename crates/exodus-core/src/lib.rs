//! Core types and trait definitions for the Exodus resource server.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::ResourceStore`]; the API layer depends
//! on that trait, never on a concrete backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod json;
pub mod resource;
pub mod store;

pub use error::{Error, ErrorKind, Result, StoreError};
