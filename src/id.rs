//! Record identifier generation.
//!
//! Identifiers come from a large random space rather than a counter:
//! several independent processes may write to the same store with no
//! coordination, and no registry of issued ids is kept.

use crate::record::RecordId;

/// Source of fresh record identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RecordId;
}

/// Random version-4 UUIDs, drawn from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> RecordId {
        RecordId::new(uuid::Uuid::new_v4().to_string())
    }
}
