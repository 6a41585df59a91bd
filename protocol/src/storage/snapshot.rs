//! Snapshot stack with revert-to-id semantics.
//!
//! `begin` pushes a copy of the current state and hands back an id.
//! `rollback(id)` returns the state captured at `id` and discards that
//! snapshot along with every one taken after it. `commit(id)` discards the
//! same range without restoring anything. Ids are never reused, so a stale
//! id fails cleanly instead of reverting to the wrong point.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unknown or already released snapshot {0:?}")]
    UnknownSnapshot(SnapshotId),
}

#[derive(Debug, Clone)]
pub struct SnapshotStack<T: Clone> {
    entries: Vec<(SnapshotId, T)>,
    next_id: u64,
}

impl<T: Clone> Default for SnapshotStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SnapshotStack<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Capture `state` and return the id to roll back to.
    pub fn begin(&mut self, state: &T) -> SnapshotId {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, state.clone()));
        id
    }

    /// Revert to the state captured at `id`.
    pub fn rollback(&mut self, id: SnapshotId) -> Result<T, SnapshotError> {
        let pos = self.position(id)?;
        let mut released = self.entries.split_off(pos);
        Ok(released.swap_remove(0).1)
    }

    /// Keep the current state and release `id` and everything after it.
    pub fn commit(&mut self, id: SnapshotId) -> Result<(), SnapshotError> {
        let pos = self.position(id)?;
        self.entries.truncate(pos);
        Ok(())
    }

    /// Number of live snapshots.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, id: SnapshotId) -> Result<usize, SnapshotError> {
        self.entries
            .iter()
            .position(|(entry_id, _)| *entry_id == id)
            .ok_or(SnapshotError::UnknownSnapshot(id))
    }
}
