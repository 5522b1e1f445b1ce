//! Lock-free publication of the model.
//!
//! The root lives in an `ArcSwap`: readers take a reference-counted snapshot without locking, so
//! the audio participant can observe the model wait-free while the UI and allocator replace it.
//! Writers are serialized by a plain mutex around a clone-transform-store cycle; the clone is
//! cheap because the model's collections share structure.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::model::Model;

pub(crate) struct SnapshotCell {
    current: ArcSwap<Model>,
    /// Serializes non-audio writers; never taken on a read.
    write_lock: Mutex<()>,
}

impl SnapshotCell {
    pub(crate) fn new(initial: Model) -> SnapshotCell {
        SnapshotCell {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
        }
    }

    /// The currently published snapshot.  Wait-free; safe from any participant.
    pub(crate) fn read(&self) -> Arc<Model> {
        self.current.load_full()
    }

    /// Apply `transform` to the current root and publish the result, returning the new snapshot.
    ///
    /// Only one update runs at a time.  `transform` must confine its effects to the value it
    /// returns; it may run while other participants are still reading older snapshots.
    pub(crate) fn update_publish(&self, transform: impl FnOnce(Model) -> Model) -> Arc<Model> {
        let _guard = self.write_lock.lock().unwrap();
        let next = Arc::new(transform((*self.current.load_full()).clone()));
        self.current.store(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_keep_their_snapshot_across_updates() {
        let cell = SnapshotCell::new(Model::default());
        let before = cell.read();
        cell.update_publish(|mut m| {
            m.next_id = 7;
            m
        });
        assert_eq!(before.next_id, 0);
        assert_eq!(cell.read().next_id, 7);
    }

    #[test]
    fn update_returns_the_published_value() {
        let cell = SnapshotCell::new(Model::default());
        let out = cell.update_publish(|mut m| {
            m.next_id = 3;
            m
        });
        assert_eq!(out.next_id, 3);
        assert!(Arc::ptr_eq(&out, &cell.read()));
    }
}
