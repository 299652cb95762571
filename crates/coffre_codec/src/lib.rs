//! # coffre Codec
//!
//! Field-level, site-keyed encryption between documents and physical rows.
//!
//! The codec is backend-independent: providers compose a [`RowCodec`] and
//! never touch key material themselves. Three per-tenant flags control what
//! gets obfuscated - the organization code, local ids, and the payload -
//! each independently, so a deployment can run fully cleartext, fully
//! encrypted, or anything in between.
//!
//! Id obfuscation is deterministic (equal inputs produce equal outputs) so
//! that point lookups and namespace-bounded range scans keep working on
//! ciphertext. Payload encryption uses a random nonce per write.
//!
//! Crypto and decode failures are never classified as transient: they
//! indicate key misconfiguration or data corruption.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod keys;
mod row;

pub use error::{CodecError, CodecResult};
pub use keys::{SecretKey, TenantKeys, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use row::RowCodec;
