//! # coffre Blob
//!
//! Boundary for file attachments. Rows hold metadata; the bytes of an
//! attachment live behind the [`BlobStore`] trait, addressed by
//! `(org, id, file_id)`. Each component is obfuscated with the tenant's
//! row codec before it reaches the physical key space, so a bucket or
//! directory listing reveals nothing about organizations or documents.
//!
//! Two implementations ship here: [`MemoryBlobStore`] for tests and
//! ephemeral use, and [`FsBlobStore`] over a local directory tree.
//! Direct-upload URL generation belongs to the hosting service, not to
//! this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod fs;
mod memory;
mod store;

pub use error::{BlobError, BlobResult};
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use store::BlobStore;
