//! # coffre Schema
//!
//! Static catalog of collections and the row/document model shared by every
//! storage backend.
//!
//! The catalog is the single source of truth for physical access: each
//! backend derives its statements, paths and column bindings from the
//! ordered attribute list returned by [`Collection::schema`]. Adding or
//! changing a collection's shape touches only this crate.
//!
//! ## Model
//!
//! - [`Collection`] - fixed enum of every collection the platform stores
//! - [`Attribute`] / [`AttrKind`] - one indexed column and its value kind
//! - [`Row`] - the physical unit: structural columns plus an opaque payload
//! - [`Document`] - the decoded business object, tagged with its collection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod document;
mod row;
mod value;

pub use catalog::{AttrKind, Attribute, Collection};
pub use document::Document;
pub use row::{Row, RowKey};
pub use value::FieldValue;
