//! Stdio JSON-lines protocol surface for Context Cache (spec.md §6).

pub mod error;
pub mod protocol;
pub mod server;

pub use error::{ServerError, ServerResult};
pub use protocol::{Request, Response};
pub use server::Server;
