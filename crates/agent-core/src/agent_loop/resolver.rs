//! Element resolution with snapshot-epoch staleness enforcement.
//!
//! Indices are never trusted across snapshots: a reference minted by epoch N
//! resolved against any other epoch fails as stale rather than acting on
//! whatever widget occupies that index now.

use apptap_core_types::SnapshotEpoch;
use thiserror::Error;

use super::snapshot::{ElementRef, Snapshot};

/// Why an index failed to resolve.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum ResolveError {
    /// The reference was minted by a different snapshot than the current one.
    #[error("reference is from a different snapshot epoch")]
    Stale,
    /// The index is not in the current snapshot's interactive set.
    #[error("no interactive element with that index")]
    NotFound,
}

impl Snapshot {
    /// Resolve interactive index `index` as minted by snapshot epoch
    /// `minted_at` against this snapshot. A pure lookup: out-of-epoch
    /// references fail before the index is even consulted.
    pub fn resolve(
        &self,
        index: u32,
        minted_at: SnapshotEpoch,
    ) -> Result<&ElementRef, ResolveError> {
        if minted_at != self.epoch {
            return Err(ResolveError::Stale);
        }
        self.selector_map.get(&index).ok_or(ResolveError::NotFound)
    }
}
