//! Core types, configuration, and content primitives for Context Cache.
//!
//! This crate provides:
//! - Configuration management (`Config`, environment parsing)
//! - The domain models shared by every other crate (`File`, `Fragment`,
//!   `Conversation`, `Exchange`, `SourceTag`)
//! - The Fragmenter (word-window chunking) and Hasher (content fingerprints)
//! - Common error types

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod fragmenter;
pub mod hasher;
pub mod models;

pub use config::Config;
pub use error::{CoreError, Result};
pub use fragmenter::fragment_text;
pub use hasher::{hash_conversation_payload, hash_file_contents};
pub use models::{Conversation, Exchange, File, Fragment, SourceTag};
