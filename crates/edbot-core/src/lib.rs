//! Core domain + application logic for EDBot.
//!
//! This crate is intentionally framework-agnostic. Discord lives behind the
//! messaging port (trait) implemented in the adapter crate; HTTP sources live
//! behind the `NewsSource` / `AttachmentFetcher` seams.

pub mod config;
pub mod domain;
pub mod errors;
pub mod gallery;
pub mod logging;
pub mod messaging;
pub mod news;

pub use errors::{Error, FetchError, Result};
