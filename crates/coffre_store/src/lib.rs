//! # coffre Store
//!
//! One query contract, three storage realizations.
//!
//! The [`Provider`] trait is the whole storage surface the application
//! sees: point lookups, watermark reads, namespace scans, bulk mutation,
//! the task queue and the namespace purge. Three backends implement it
//! with their native mechanisms:
//!
//! - [`DocProvider`] - an in-process document store filtering on indexed
//!   fields, with batch-atomic commits
//! - [`SqlProvider`] - a relational realization over SQLite, generating
//!   parameterized SQL per collection and caching the statement *text*
//!   per connection
//! - [`EmbeddedProvider`] - single-file SQLite in WAL mode, same statement
//!   generation, process-local *prepared statement* cache
//!
//! All three produce identical logical results for the same fixture; the
//! cross-backend contract test in `tests/` holds them to it.
//!
//! Transactions run through [`run_operation`]: begin, invoke the business
//! callback, flush staged writes in insert/update/delete order, commit.
//! Failures are rolled back and classified into a retryable or fatal
//! [`Outcome`]; errors raised by the callback itself propagate unchanged.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod doc;
mod error;
mod operation;
mod provider;
mod sql;

pub use doc::DocProvider;
pub use error::{ErrorClass, StoreError, StoreResult};
pub use operation::{run_operation, OpError, OperationContext, Outcome};
pub use provider::{Provider, Task, TaskKey, WriteBatch, WriteMode, HEARTBEAT_ID};
pub use sql::{EmbeddedProvider, SqlProvider};
