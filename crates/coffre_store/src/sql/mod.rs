//! SQL realizations of the provider contract.
//!
//! Both backends generate their statements from the schema registry's
//! attribute lists through [`stmt`]; they differ in how statements are
//! cached. The relational provider keeps generated statement *text* per
//! connection and prepares on use; the embedded provider keeps fully
//! prepared statements process-locally via `prepare_cached`.

mod core;
mod embedded;
mod relational;
mod stmt;

pub use embedded::EmbeddedProvider;
pub use relational::SqlProvider;
