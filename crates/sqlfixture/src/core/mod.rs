//! Value and metadata model shared by every other module.
//!
//! - [`value`]: in-memory cell values, including NULL and unset
//! - [`types`]: canonical column types with cast/compare/wire contracts
//! - [`wire`]: typed statement parameters
//! - [`resolver`]: database type names to canonical types
//! - [`column`], [`metadata`]: column descriptors and table metadata
//! - [`identifier`]: identifier validation and quoting

pub mod column;
pub mod identifier;
pub mod metadata;
pub mod resolver;
pub mod types;
pub mod value;
pub mod wire;

pub use column::{Column, Nullable};
pub use identifier::QuoteStyle;
pub use metadata::TableMetaData;
pub use resolver::{BaseTypeResolver, TypeResolver};
pub use types::{ColumnType, TypeFamily};
pub use value::Value;
pub use wire::{SqlNullType, SqlValue};
