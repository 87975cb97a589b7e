// Fetch container: a future value realized into a runtime resource on poll

use anyhow::Result;
use futures::FutureExt;
use log::debug;
use parking_lot::Mutex;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use super::FetchFuture;
use crate::fatal;

/// A runtime resource that can be realized from fetched data
///
/// `Context` is whatever the realization needs on the main thread: a graphics
/// device, an audio device, or nothing.
pub trait Resource: Send + Sync + 'static {
    type Context: ?Sized;
}

trait PendingRealize<T: Resource>: Send {
    /// Build the resource if the data has arrived
    fn try_realize(&mut self, cx: &mut T::Context) -> Option<Result<T>>;
}

struct PendingValue<D, F> {
    future: FetchFuture<D>,
    realize: Option<F>,
}

impl<T, D, F> PendingRealize<T> for PendingValue<D, F>
where
    T: Resource,
    D: Send + Sync + 'static,
    F: FnOnce(&D, &mut T::Context) -> Result<T> + Send,
{
    fn try_realize(&mut self, cx: &mut T::Context) -> Option<Result<T>> {
        let data = self.future.clone().now_or_never()?;
        let realize = self.realize.take()?;
        Some(realize(&data, cx))
    }
}

enum State<T: Resource> {
    Empty,
    Pending(Box<dyn PendingRealize<T>>),
    Ready(Arc<T>),
}

type ReadyCallback<T> = Box<dyn FnOnce(&T) + Send>;

struct Inner<T: Resource> {
    state: State<T>,
    callbacks: Vec<ReadyCallback<T>>,
}

/// Shared handle to a resource that may not exist yet
///
/// Clones share one state, so the resource is realized once no matter how many
/// components hold it.
pub struct Fetched<T: Resource> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Resource> Fetched<T> {
    fn with_state(state: State<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Container that holds nothing and never becomes ready
    pub fn empty() -> Self {
        Self::with_state(State::Empty)
    }

    /// Container that is ready immediately
    pub fn ready(value: T) -> Self {
        Self::with_state(State::Ready(Arc::new(value)))
    }

    /// Container realized from `future` by `realize` once the data arrives
    pub fn pending<D, F>(future: FetchFuture<D>, realize: F) -> Self
    where
        D: Send + Sync + 'static,
        F: FnOnce(&D, &mut T::Context) -> Result<T> + Send + 'static,
    {
        Self::with_state(State::Pending(Box::new(PendingValue {
            future,
            realize: Some(realize),
        })))
    }

    /// Realize the resource if its data has arrived.
    ///
    /// Returns true only on the call that performs the realization. Cheap when
    /// there is nothing to do. A realization error is fatal.
    pub fn poll(&self, cx: &mut T::Context) -> bool {
        let (value, callbacks) = {
            let mut inner = self.inner.lock();
            let State::Pending(pending) = &mut inner.state else {
                return false;
            };
            let Some(result) = pending.try_realize(cx) else {
                return false;
            };
            let value = match result {
                Ok(value) => Arc::new(value),
                Err(e) => fatal!("Failed to realize {}: {:#}", type_name::<T>(), e),
            };
            inner.state = State::Ready(Arc::clone(&value));
            (value, std::mem::take(&mut inner.callbacks))
        };

        debug!("Realized {}", type_name::<T>());
        for callback in callbacks {
            callback(&value);
        }
        true
    }

    /// True once the resource is realized
    pub fn has_value(&self) -> bool {
        matches!(self.inner.lock().state, State::Ready(_))
    }

    /// True while waiting for data or realization
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.lock().state, State::Pending(_))
    }

    /// True for a container that was never given a source
    pub fn is_empty(&self) -> bool {
        matches!(self.inner.lock().state, State::Empty)
    }

    /// The realized resource, or `None` if not ready
    pub fn try_value(&self) -> Option<Arc<T>> {
        match &self.inner.lock().state {
            State::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The realized resource. Reading a container that is not ready is fatal.
    pub fn value(&self) -> Arc<T> {
        match self.try_value() {
            Some(value) => value,
            None => fatal!("Value of {} read before it is ready", type_name::<T>()),
        }
    }

    /// Run `callback` once the resource is realized, or now if it already is
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let value = {
            let mut inner = self.inner.lock();
            let ready = match &inner.state {
                State::Ready(value) => Some(Arc::clone(value)),
                _ => None,
            };
            match ready {
                Some(value) => value,
                None => {
                    inner.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&value);
    }

    /// True if both handles share the same state
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Resource> Clone for Fetched<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Resource> Default for Fetched<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Resource> fmt::Debug for Fetched<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.lock().state {
            State::Empty => "empty",
            State::Pending(_) => "pending",
            State::Ready(_) => "ready",
        };
        write!(f, "Fetched<{}>({})", type_name::<T>(), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fetch::{Composite, FetchCache, FetchEngine, MemorySource, ResourceKey};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Bytes(Vec<u8>);

    impl Composite for Bytes {
        type Part = Vec<u8>;

        fn decode_part(_index: usize, bytes: &[u8]) -> Result<Vec<u8>> {
            Ok(bytes.to_vec())
        }

        fn assemble(parts: BTreeMap<usize, Vec<u8>>) -> Result<Self> {
            Ok(Bytes(parts.into_values().flatten().collect()))
        }
    }

    /// Counts realizations performed through it
    #[derive(Default)]
    struct Counter {
        built: usize,
    }

    #[derive(Debug)]
    struct Length(usize);

    impl Resource for Length {
        type Context = Counter;
    }

    fn realize(data: &Bytes, counter: &mut Counter) -> Result<Length> {
        counter.built += 1;
        Ok(Length(data.0.len()))
    }

    #[test]
    fn test_pending_until_polled_after_arrival() {
        let source = Arc::new(MemorySource::new());
        source.insert("blob", vec![1, 2, 3]);
        let cache = FetchCache::new(FetchEngine::new(source.clone()));
        let future = cache.fetch::<Bytes, _, _>(ResourceKey::from_path("blob"), [(0, "blob")]);

        let fetched: Fetched<Length> = Fetched::pending(future, realize);
        let mut counter = Counter::default();

        assert!(!fetched.poll(&mut counter));
        assert!(fetched.is_pending());

        source.deliver_all();
        assert!(!fetched.has_value());
        assert!(fetched.poll(&mut counter));
        assert!(fetched.has_value());
        assert_eq!(fetched.value().0, 3);
    }

    #[test]
    fn test_realized_exactly_once_across_clones() {
        let fetched: Fetched<Length> = Fetched::pending(FetchCache::ready(Bytes(vec![0; 5])), realize);
        let clones: Vec<_> = (0..4).map(|_| fetched.clone()).collect();
        let mut counter = Counter::default();

        let transitions = clones.iter().filter(|c| c.poll(&mut counter)).count();
        assert_eq!(transitions, 1);
        assert!(!fetched.poll(&mut counter));
        assert_eq!(counter.built, 1);
        assert!(Arc::ptr_eq(&fetched.value(), &clones[3].value()));
    }

    #[test]
    fn test_on_ready_runs_once_at_realization() {
        let fetched: Fetched<Length> = Fetched::pending(FetchCache::ready(Bytes(vec![9; 2])), realize);
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        fetched.on_ready(move |value: &Length| {
            assert_eq!(value.0, 2);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut counter = Counter::default();
        fetched.poll(&mut counter);
        fetched.poll(&mut counter);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Registered after realization: runs immediately
        let seen = Arc::clone(&calls);
        fetched.on_ready(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ready_and_empty() {
        let ready = Fetched::ready(Length(7));
        assert!(ready.has_value());
        assert!(!ready.poll(&mut Counter::default()));

        let empty: Fetched<Length> = Fetched::empty();
        assert!(empty.is_empty());
        assert!(empty.try_value().is_none());
        assert!(!empty.poll(&mut Counter::default()));
    }

    #[test]
    #[should_panic(expected = "read before it is ready")]
    fn test_value_before_ready_is_fatal() {
        let empty: Fetched<Length> = Fetched::empty();
        let _ = empty.value();
    }

    #[test]
    #[should_panic(expected = "Failed to realize")]
    fn test_realize_error_is_fatal() {
        let fetched: Fetched<Length> = Fetched::pending(FetchCache::ready(Bytes(vec![])), |_: &Bytes, _: &mut Counter| {
            Err(anyhow::anyhow!("channels must be 3 or 4"))
        });
        fetched.poll(&mut Counter::default());
    }
}
