use crate::Result;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub trait SentinelRule: fmt::Debug + Send + Sync {
    fn resource_name(&self) -> String;
    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}

/// RuleStore holds the immutable snapshot a rule class is evaluated against.
///
/// Readers take the current snapshot without locking and keep using it for the whole check,
/// while an update builds a complete new snapshot and publishes it with a single pointer swap.
/// Updates are serialized by `writer`, so a snapshot derived from the current one
/// never overwrites a concurrent update.
pub struct RuleStore<S> {
    snapshot: ArcSwap<S>,
    epoch: AtomicU64,
    writer: Mutex<()>,
}

impl<S: Default> Default for RuleStore<S> {
    fn default() -> Self {
        RuleStore::new(S::default())
    }
}

impl<S> RuleStore<S> {
    pub fn new(initial: S) -> Self {
        RuleStore {
            snapshot: ArcSwap::new(Arc::new(initial)),
            epoch: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// The current snapshot.
    #[inline]
    pub fn load(&self) -> Arc<S> {
        self.snapshot.load_full()
    }

    /// How many snapshots have been published.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Derives the next snapshot from the current one.
    /// `f` returns `None` when nothing changes, then nothing is published.
    /// Returns whether a new snapshot was published.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&S) -> Option<S>,
    {
        let _guard = self.writer.lock().unwrap();
        let current = self.snapshot.load_full();
        match f(&current) {
            Some(next) => {
                self.snapshot.store(Arc::new(next));
                self.epoch.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for RuleStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStore")
            .field("epoch", &self.epoch())
            .field("snapshot", &self.load())
            .finish()
    }
}
