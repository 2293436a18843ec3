//! Source unit storage, span tracking, and line/column resolution.
//!
//! This crate provides the [`SourceDb`] that owns the text of every source
//! unit loaded into a compilation session, [`FileId`] and [`Span`] for
//! tracking byte ranges, and [`ResolvedSpan`] for reporting positions in
//! editor coordinates.

#![warn(missing_docs)]

pub mod file_id;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::{LinePosition, SourceFile};
pub use span::Span;
