//! # sqlx-sqlite-columns
//!
//! Typed column codecs: store arbitrary serde values in SQLite text or binary
//! columns.
//!
//! ## Core Types
//!
//! - **[`Codec`]**: encode/decode pair between a value type and a [`ColumnValue`]
//! - **[`SerdeCodec`]** / **[`FnCodec`]**: serde-backed and hand-written codecs
//! - **[`WireFormat`]**: JSON text, bincode, or the tagged binary format in [`tag`]
//! - **[`CodecRegistry`]**: codecs keyed by a stable [`TypeKey`], resolved when a column is registered
//! - **[`TypedColumn`]**: a named column of a [`ColumnKind`] bound to a codec
//! - **[`Table`]**: ordered column descriptors plus a primary key
//!
//! Column kinds and wire formats combine freely: a binary format in a text
//! column is stored as base64, a text format in a binary column as UTF-8
//! bytes. Bounded binary columns reject payloads longer than their length
//! before anything reaches the database, and so do bounded text columns,
//! because SQLite does not enforce `VARCHAR(n)`.

mod codec;
mod column;
mod error;
mod finite;
mod format;
mod ident;
mod registry;
mod table;
pub mod tag;
mod value;

pub use codec::{Codec, FnCodec, SerdeCodec};
pub use column::{ColumnDescriptor, ColumnKind, TypedColumn};
pub use error::{Error, Result};
pub use format::WireFormat;
pub use ident::{quote_identifier, validate_identifier};
pub use registry::{CodecRegistry, TypeKey};
pub use table::Table;
pub use value::{CellValue, ColumnValue};
