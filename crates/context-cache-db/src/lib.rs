//! The embedded relational store for Context Cache.
//!
//! Wraps a single `SQLite` connection (via `rusqlite`) behind [`Store`],
//! with schema management in [`schema`], the embedding byte layout in
//! [`embedding`], and connection-agnostic CRUD in [`queries`].

pub mod embedding;
pub mod error;
pub mod queries;
pub mod schema;
pub mod store;

pub use embedding::{decode_embedding, encode_embedding};
pub use error::{DbError, DbResult};
pub use queries::HydratedFragment;
pub use store::Store;
