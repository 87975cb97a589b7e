// Deduplicating cache of in-flight and completed fetches

use anyhow::Result;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::{FetchEngine, FetchProgress, ResourceKey};
use crate::fatal;

/// Shared future resolving to a decoded value
pub type FetchFuture<T> = Shared<BoxFuture<'static, Arc<T>>>;

/// A value assembled from one or more independently fetched parts
///
/// Parts are decoded on the thread that receives their bytes. `assemble` runs
/// once, on the thread delivering the last part.
pub trait Composite: Sized + Send + Sync + 'static {
    type Part: Send + 'static;

    /// Decode the bytes of part `index`
    fn decode_part(index: usize, bytes: &[u8]) -> Result<Self::Part>;

    /// Build the value from every part, keyed by index
    fn assemble(parts: BTreeMap<usize, Self::Part>) -> Result<Self>;
}

struct Slot<T: Composite> {
    expected: usize,
    parts: BTreeMap<usize, T::Part>,
    sender: Option<oneshot::Sender<Arc<T>>>,
}

struct Entry<T: Composite> {
    future: FetchFuture<T>,
    slot: Mutex<Slot<T>>,
}

impl<T: Composite> Entry<T> {
    fn new(expected: usize) -> Self {
        let (sender, receiver) = oneshot::channel::<Arc<T>>();
        let future = async move {
            match receiver.await {
                Ok(value) => value,
                // Sender dropped without a value: stay pending forever
                Err(_) => futures::future::pending::<Arc<T>>().await,
            }
        }
        .boxed()
        .shared();

        Self {
            future,
            slot: Mutex::new(Slot {
                expected,
                parts: BTreeMap::new(),
                sender: Some(sender),
            }),
        }
    }

    fn receive(&self, index: usize, part: T::Part) -> Result<()> {
        let (parts, sender) = {
            let mut slot = self.slot.lock();
            slot.parts.insert(index, part);
            if slot.parts.len() < slot.expected {
                return Ok(());
            }
            let Some(sender) = slot.sender.take() else {
                return Ok(());
            };
            (std::mem::take(&mut slot.parts), sender)
        };

        let value = T::assemble(parts)?;
        // The receiver lives inside the cached future, so this cannot be refused
        let _ = sender.send(Arc::new(value));
        Ok(())
    }
}

/// Maps resource keys to shared futures, issuing at most one fetch per key
///
/// Entries are kept for the lifetime of the cache.
pub struct FetchCache {
    engine: FetchEngine,
    entries: Mutex<HashMap<ResourceKey, Arc<dyn Any + Send + Sync>>>,
}

impl FetchCache {
    pub fn new(engine: FetchEngine) -> Self {
        Self {
            engine,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Future for the value identified by `key`, fetching its parts on first request.
    ///
    /// `parts` lists `(part_index, path)` pairs. Later requests for the same key
    /// share the first request's future and issue no IO. Requesting a key
    /// with another value type, with no parts or with repeated indices, is fatal.
    pub fn fetch<T, I, S>(&self, key: ResourceKey, parts: I) -> FetchFuture<T>
    where
        T: Composite,
        I: IntoIterator<Item = (usize, S)>,
        S: AsRef<str>,
    {
        let parts: Vec<(usize, String)> = parts
            .into_iter()
            .map(|(index, path)| (index, path.as_ref().to_string()))
            .collect();

        if parts.is_empty() {
            fatal!("Fetch of {:?} as {} has no parts", key, type_name::<T>());
        }
        let distinct: BTreeSet<usize> = parts.iter().map(|(index, _)| *index).collect();
        if distinct.len() != parts.len() {
            fatal!("Fetch of {:?} as {} repeats a part index", key, type_name::<T>());
        }

        let (entry, created) = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let entry: Arc<dyn Any + Send + Sync> = Arc::new(Entry::<T>::new(parts.len()));
                    entries.insert(key, Arc::clone(&entry));
                    (entry, true)
                }
            }
        };

        let entry = match entry.downcast::<Entry<T>>() {
            Ok(entry) => entry,
            Err(_) => fatal!("Resource {:?} requested as {} but cached as another type", key, type_name::<T>()),
        };

        if created {
            debug!("Fetching {:?} as {} in {} part(s)", key, type_name::<T>(), parts.len());
            for (index, path) in parts {
                let entry = Arc::clone(&entry);
                self.engine.fetch_bytes(&path, move |bytes| {
                    let part = T::decode_part(index, &bytes)?;
                    entry.receive(index, part)
                });
            }
        }

        entry.future.clone()
    }

    /// Already-resolved future for a value built in memory
    pub fn ready<T: Send + Sync + 'static>(value: T) -> FetchFuture<T> {
        futures::future::ready(Arc::new(value)).boxed().shared()
    }

    /// True if a fetch for `key` was ever issued
    pub fn contains(&self, key: ResourceKey) -> bool {
        self.entries.lock().contains_key(&key)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fetch counters of the underlying engine
    pub fn progress(&self) -> FetchProgress {
        self.engine.progress()
    }

    pub fn engine(&self) -> &FetchEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fetch::MemorySource;
    use futures::FutureExt;
    use std::thread;

    /// Concatenation of text parts
    #[derive(Debug, PartialEq)]
    struct Joined(String);

    impl Composite for Joined {
        type Part = String;

        fn decode_part(_index: usize, bytes: &[u8]) -> Result<String> {
            Ok(String::from_utf8(bytes.to_vec())?)
        }

        fn assemble(parts: BTreeMap<usize, String>) -> Result<Self> {
            Ok(Joined(parts.into_values().collect::<Vec<_>>().join("")))
        }
    }

    #[derive(Debug)]
    struct Other;

    impl Composite for Other {
        type Part = ();

        fn decode_part(_index: usize, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }

        fn assemble(_parts: BTreeMap<usize, ()>) -> Result<Self> {
            Ok(Other)
        }
    }

    fn cache_with(source: &Arc<MemorySource>) -> FetchCache {
        FetchCache::new(FetchEngine::new(source.clone()))
    }

    #[test]
    fn test_same_key_shares_one_fetch() {
        let source = Arc::new(MemorySource::new());
        source.insert("vs.txt", b"vertex ".to_vec());
        source.insert("fs.txt", b"fragment".to_vec());
        let cache = cache_with(&source);

        let paths = [(0, "vs.txt"), (1, "fs.txt")];
        let key = ResourceKey::from_paths(paths.iter().map(|(_, p)| *p));
        let first = cache.fetch::<Joined, _, _>(key, paths);
        let second = cache.fetch::<Joined, _, _>(key, paths);

        assert_eq!(source.requests().len(), 2);
        assert_eq!(cache.len(), 1);

        source.deliver_all();
        let a = first.now_or_never().unwrap();
        let b = second.now_or_never().unwrap();
        assert_eq!(*a, Joined("vertex fragment".to_string()));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.progress().completed, 2);
    }

    #[test]
    fn test_pending_until_every_part_arrives() {
        let source = Arc::new(MemorySource::new());
        source.insert("a", b"a".to_vec());
        source.insert("b", b"b".to_vec());
        let cache = cache_with(&source);

        let future = cache.fetch::<Joined, _, _>(ResourceKey::from_paths(["a", "b"]), [(0, "a"), (1, "b")]);
        assert!(future.clone().now_or_never().is_none());

        source.deliver("b");
        assert!(future.clone().now_or_never().is_none());

        source.deliver("a");
        assert_eq!(future.now_or_never().unwrap().0, "ab");
    }

    #[test]
    fn test_six_parts_from_many_threads() {
        let source = Arc::new(MemorySource::new());
        let faces = ["px", "nx", "py", "ny", "pz", "nz"];
        for (i, face) in faces.iter().enumerate() {
            source.insert(face, i.to_string().into_bytes());
        }
        let cache = cache_with(&source);

        let key = ResourceKey::from_paths(faces);
        let future = cache.fetch::<Joined, _, _>(key, faces.iter().enumerate().map(|(i, f)| (i, *f)));

        // Deliver in a scrambled order from separate threads
        let order = [4, 1, 5, 0, 3, 2];
        let handles: Vec<_> = order
            .iter()
            .map(|&i| {
                let source = Arc::clone(&source);
                let face = faces[i];
                thread::spawn(move || assert!(source.deliver(face)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(future.now_or_never().unwrap().0, "012345");
        assert_eq!(cache.progress().completed, 6);
    }

    #[test]
    fn test_failed_part_stays_pending() {
        let source = Arc::new(MemorySource::new());
        source.insert("a", b"a".to_vec());
        source.insert("b", b"b".to_vec());
        let cache = cache_with(&source);

        let future = cache.fetch::<Joined, _, _>(ResourceKey::from_paths(["a", "b"]), [(0, "a"), (1, "b")]);
        source.deliver("a");
        source.fail("b");

        assert!(future.now_or_never().is_none());
        let progress = cache.progress();
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.completed, 1);
    }

    #[test]
    #[should_panic(expected = "cached as another type")]
    fn test_type_mismatch_is_fatal() {
        let source = Arc::new(MemorySource::new());
        let cache = cache_with(&source);
        let key = ResourceKey::from_path("x");
        let _ = cache.fetch::<Joined, _, _>(key, [(0, "x")]);
        let _ = cache.fetch::<Other, _, _>(key, [(0, "x")]);
    }

    #[test]
    #[should_panic(expected = "has no parts")]
    fn test_empty_parts_is_fatal() {
        let source = Arc::new(MemorySource::new());
        let cache = cache_with(&source);
        let _ = cache.fetch::<Joined, _, &str>(ResourceKey::from_path("x"), []);
    }

    #[test]
    fn test_ready_future_resolves_immediately() {
        let future = FetchCache::ready(Joined("now".to_string()));
        assert_eq!(future.now_or_never().unwrap().0, "now");
    }
}
