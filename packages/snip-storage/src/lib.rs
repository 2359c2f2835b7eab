pub mod backend;
pub mod local;
pub mod remote;
pub mod schema;
pub mod selector;

mod error;
mod vector;

pub use backend::{BoxFuture, NoteBackend, build_backend};
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
