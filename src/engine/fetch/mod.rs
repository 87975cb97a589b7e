// Asynchronous resource fetching
//
// Bytes arrive on background callbacks, are decoded off-thread, and are
// deduplicated per resource key. Native objects are only built later, when the
// main thread polls a `Fetched` container.

mod cache;
mod fetched;
mod key;
mod source;

pub use cache::{Composite, FetchCache, FetchFuture};
pub use fetched::{Fetched, Resource};
pub use key::{fnv1a, hash_combine, ResourceKey};
pub use source::{ByteSource, FileSource, MemorySource, ReadCallback};

use anyhow::Result;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global fetch counters, shared with every completion callback
#[derive(Debug, Default)]
pub struct FetchCounters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl FetchCounters {
    /// Snapshot the counters
    pub fn snapshot(&self) -> FetchProgress {
        FetchProgress {
            total: self.total.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time view of fetch activity, for loading screens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchProgress {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

impl FetchProgress {
    /// Requests issued but not yet finished
    pub fn in_flight(&self) -> u64 {
        self.total.saturating_sub(self.completed + self.failed)
    }

    /// True when no request is outstanding
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Fraction of issued requests that finished, successfully or not
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed + self.failed) as f32 / self.total as f32
        }
    }
}

/// Issues asynchronous whole-file reads and tracks their outcome
#[derive(Clone)]
pub struct FetchEngine {
    source: Arc<dyn ByteSource>,
    counters: Arc<FetchCounters>,
}

impl FetchEngine {
    /// Create an engine reading from `source`
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        Self {
            source,
            counters: Arc::new(FetchCounters::default()),
        }
    }

    /// Read the whole content of `path` and hand it to `callback`.
    ///
    /// The callback runs at most once, on the thread completing the read. A
    /// read error or a callback error counts the request as failed and is
    /// logged; there is no retry.
    pub fn fetch_bytes<F>(&self, path: &str, callback: F)
    where
        F: FnOnce(Vec<u8>) -> Result<()> + Send + 'static,
    {
        self.counters.total.fetch_add(1, Ordering::AcqRel);
        let counters = Arc::clone(&self.counters);
        let owned_path = path.to_string();

        self.source.read(
            path,
            Box::new(move |result| match result {
                Ok(bytes) => {
                    let size = bytes.len();
                    match callback(bytes) {
                        Ok(()) => {
                            counters.completed.fetch_add(1, Ordering::AcqRel);
                            debug!("Fetched {} ({} bytes)", owned_path, size);
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::AcqRel);
                            warn!("Failed to decode {}: {:#}", owned_path, e);
                        }
                    }
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::AcqRel);
                    warn!("Failed to fetch {}: {:#}", owned_path, e);
                }
            }),
        );
    }

    /// Current counter snapshot
    pub fn progress(&self) -> FetchProgress {
        self.counters.snapshot()
    }

    /// Shared counters
    pub fn counters(&self) -> Arc<FetchCounters> {
        Arc::clone(&self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_callback_runs_once_on_success() {
        let source = Arc::new(MemorySource::new());
        source.insert("a.bin", vec![7; 4]);
        let engine = FetchEngine::new(source.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        engine.fetch_bytes("a.bin", move |bytes| {
            assert_eq!(bytes.len(), 4);
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(engine.progress().in_flight(), 1);
        source.deliver_all();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let progress = engine.progress();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.completed, 1);
        assert!(progress.is_idle());
    }

    #[test]
    fn test_read_failure_skips_callback() {
        let source = Arc::new(MemorySource::immediate());
        let engine = FetchEngine::new(source);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        engine.fetch_bytes("missing.bin", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.progress().failed, 1);
        assert_eq!(engine.progress().completed, 0);
    }

    #[test]
    fn test_decode_error_counts_as_failed() {
        let source = Arc::new(MemorySource::immediate());
        source.insert("bad.bin", vec![0]);
        let engine = FetchEngine::new(source);

        engine.fetch_bytes("bad.bin", |_| Err(anyhow::anyhow!("bad tag")));

        let progress = engine.progress();
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.completed, 0);
        assert_eq!(progress.ratio(), 1.0);
    }

    #[test]
    fn test_progress_ratio() {
        let progress = FetchProgress {
            total: 4,
            completed: 1,
            failed: 1,
        };
        assert_eq!(progress.in_flight(), 2);
        assert_eq!(progress.ratio(), 0.5);
        assert_eq!(FetchProgress::default().ratio(), 1.0);
    }
}
