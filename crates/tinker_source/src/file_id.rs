//! Opaque identifier for source units loaded into a compilation session.

use serde::{Deserialize, Serialize};

/// Index of a source unit inside a [`SourceDb`](crate::SourceDb).
///
/// Ids are handed out in load order, so the first unit loaded into a session
/// is `FileId(0)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// A dummy file ID used for synthetic spans (e.g. reference-level errors).
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Creates a `FileId` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value of this `FileId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}
