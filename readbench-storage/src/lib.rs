//! The storage layer providing read access to objects in a remote storage service.
//!
//! This crate defines the [`Backend`] capability that the benchmark engine is written against,
//! together with a set of interchangeable transports for the same logical storage service.
//! Which backend to use is decided by the caller; the engine only ever sees a [`BoxedBackend`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
mod id;
mod stream;

pub use backend::{Backend, BackendError, BackendResult, BoxedBackend};
pub use id::{ObjectLocator, ReadRange};
pub use stream::PayloadStream;
