//! # Consumer records and the consumer set.
//!
//! A [`ConsumerRecord`] is one logical registration of interest in the native
//! stream: a one-shot read or the keep-alive record of a watch. It carries two
//! capability slots, `on_reading` and `on_error`, and is identified by reference
//! (`Arc::ptr_eq`), never by value.
//!
//! ## Self-removal
//! ```text
//! one-shot:  on_reading(r) ─► remove_consumer(self) ─► removed? ─► on_success(r)
//!            on_error(e)   ─► remove_consumer(self) ─► removed? ─► on_error(e)
//! watch:     on_reading(r) ─► (no-op, keeps the stream alive)
//!            on_error(e)   ─► fail_watch(id)        ─► was live? ─► on_error(e)
//! ```
//!
//! The user callback only runs when the removal actually happened, so a one-shot
//! fires at most once even if it appears in two overlapping fan-out snapshots.

use std::sync::{Arc, Weak};

use crate::core::Shared;
use crate::core::request::{ErrorCallback, Handlers};
use crate::core::watch::WatchId;
use crate::error::SensorError;
use crate::sensor::Reading;

type Slot<T> = Box<dyn Fn(T) + Send + Sync>;

/// What a record was registered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsumerKind {
    OneShot,
    Watch(WatchId),
}

/// Callback pair registered with the distributor.
pub(crate) struct ConsumerRecord {
    kind: ConsumerKind,
    on_reading: Slot<Reading>,
    on_error: Slot<SensorError>,
}

impl ConsumerRecord {
    /// Builds a one-shot record that detaches itself before calling back.
    pub(crate) fn one_shot(shared: Weak<Shared>, handlers: Handlers) -> Arc<Self> {
        let Handlers {
            on_success,
            on_error,
        } = handlers;

        Arc::new_cyclic(|me: &Weak<ConsumerRecord>| {
            let (me_r, shared_r) = (me.clone(), shared.clone());
            let (me_e, shared_e) = (me.clone(), shared);

            Self {
                kind: ConsumerKind::OneShot,
                on_reading: Box::new(move |reading| {
                    if detach(&shared_r, &me_r) {
                        on_success(reading);
                    }
                }),
                on_error: Box::new(move |err| {
                    if detach(&shared_e, &me_e)
                        && let Some(cb) = &on_error
                    {
                        cb(err);
                    }
                }),
            }
        })
    }

    /// Builds the keep-alive record of a watch.
    ///
    /// Readings are ignored here (the watch ticker delivers them); a native error
    /// cancels the whole watch and is forwarded once.
    pub(crate) fn watch(
        shared: Weak<Shared>,
        id: WatchId,
        on_error: Option<ErrorCallback>,
    ) -> Arc<Self> {
        let watch_id = id.clone();
        Arc::new(Self {
            kind: ConsumerKind::Watch(id),
            on_reading: Box::new(|_| {}),
            on_error: Box::new(move |err| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                if shared.fail_watch(&watch_id, &err)
                    && let Some(cb) = &on_error
                {
                    cb(err);
                }
            }),
        })
    }

    pub(crate) fn kind(&self) -> &ConsumerKind {
        &self.kind
    }

    pub(crate) fn on_reading(&self, reading: Reading) {
        (self.on_reading)(reading);
    }

    pub(crate) fn on_error(&self, err: SensorError) {
        (self.on_error)(err);
    }
}

fn detach(shared: &Weak<Shared>, me: &Weak<ConsumerRecord>) -> bool {
    match (shared.upgrade(), me.upgrade()) {
        (Some(shared), Some(me)) => shared.remove_consumer(&me),
        _ => false,
    }
}

/// Unordered set of consumer records keyed by identity.
#[derive(Default)]
pub(crate) struct ConsumerSet {
    records: Vec<Arc<ConsumerRecord>>,
}

impl ConsumerSet {
    pub(crate) fn insert(&mut self, record: Arc<ConsumerRecord>) {
        self.records.push(record);
    }

    /// Removes `record` by identity. Returns false if it was not present.
    pub(crate) fn remove(&mut self, record: &Arc<ConsumerRecord>) -> bool {
        match self.records.iter().position(|r| Arc::ptr_eq(r, record)) {
            Some(idx) => {
                self.records.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Copy of the current members, safe to iterate while the set mutates.
    pub(crate) fn snapshot(&self) -> Vec<Arc<ConsumerRecord>> {
        self.records.clone()
    }

    /// Removes every record, handing them back so they can be dropped unlocked.
    pub(crate) fn take_all(&mut self) -> Vec<Arc<ConsumerRecord>> {
        std::mem::take(&mut self.records)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan() -> Arc<ConsumerRecord> {
        ConsumerRecord::one_shot(Weak::new(), Handlers::new(|_| {}))
    }

    #[test]
    fn test_remove_by_identity() {
        let a = orphan();
        let b = orphan();
        let mut set = ConsumerSet::default();
        set.insert(a.clone());
        set.insert(b.clone());

        assert!(set.remove(&a));
        assert_eq!(set.len(), 1);
        assert!(!set.remove(&a), "second removal must be a no-op");
        assert!(set.remove(&b));
        assert!(set.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached_from_set() {
        let a = orphan();
        let mut set = ConsumerSet::default();
        set.insert(a.clone());

        let snap = set.snapshot();
        set.remove(&a);
        assert_eq!(snap.len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_orphan_one_shot_never_calls_back() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let rec = ConsumerRecord::one_shot(
            Weak::new(),
            Handlers::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        rec.on_reading(Reading::new(0.0, 0.0, 0.0, 0));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(rec.kind(), &ConsumerKind::OneShot);
    }
}
