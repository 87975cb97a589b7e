// Byte sources the fetch engine reads from

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;

use crate::engine::assets::AssetError;

/// Completion callback for a single read
pub type ReadCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;

/// Asynchronous provider of whole-file contents
///
/// `read` must return without blocking. `done` is invoked exactly once, on
/// whatever thread finishes the read.
pub trait ByteSource: Send + Sync {
    fn read(&self, path: &str, done: ReadCallback);
}

/// Reads files below a base directory on a tokio runtime
pub struct FileSource {
    base_path: PathBuf,
    handle: Handle,
}

impl FileSource {
    /// Create a file source rooted at `base_path`, spawning reads on `handle`
    pub fn new<P: AsRef<Path>>(base_path: P, handle: Handle) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            handle,
        }
    }

    /// Get the full path for an asset
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl ByteSource for FileSource {
    fn read(&self, path: &str, done: ReadCallback) {
        let full_path = self.resolve_path(path);
        self.handle.spawn(async move {
            let result = match tokio::fs::read(&full_path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(AssetError::NotFound(full_path.display().to_string()).into())
                }
                Err(e) => Err(AssetError::Io(e).into()),
            };
            done(result);
        });
    }
}

struct PendingRead {
    path: String,
    done: ReadCallback,
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<String, Vec<u8>>,
    pending: Vec<PendingRead>,
    requests: Vec<String>,
}

/// In-memory byte source with manual or immediate delivery
///
/// In manual mode every read is parked until `deliver` or `fail` is called
/// for its path, from any thread and in any order.
#[derive(Default)]
pub struct MemorySource {
    state: Mutex<MemoryState>,
    immediate: bool,
}

impl MemorySource {
    /// Source that parks reads until they are delivered
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that completes reads synchronously inside `read`
    pub fn immediate() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            immediate: true,
        }
    }

    /// Register the contents of a path
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.state.lock().files.insert(path.to_string(), bytes);
    }

    /// Every path requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Number of reads issued for `path`
    pub fn request_count(&self, path: &str) -> usize {
        self.state.lock().requests.iter().filter(|p| *p == path).count()
    }

    /// Number of parked reads
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Complete the oldest parked read of `path` with its registered bytes.
    ///
    /// A path without registered contents completes with a not-found error.
    /// Returns false if no read of `path` is parked.
    pub fn deliver(&self, path: &str) -> bool {
        let (pending, bytes) = {
            let mut state = self.state.lock();
            let Some(index) = state.pending.iter().position(|p| p.path == path) else {
                return false;
            };
            let pending = state.pending.remove(index);
            let bytes = state.files.get(path).cloned();
            (pending, bytes)
        };
        (pending.done)(Self::result_for(path, bytes));
        true
    }

    /// Complete the oldest parked read of `path` with an IO error
    pub fn fail(&self, path: &str) -> bool {
        let pending = {
            let mut state = self.state.lock();
            let Some(index) = state.pending.iter().position(|p| p.path == path) else {
                return false;
            };
            state.pending.remove(index)
        };
        let error = std::io::Error::new(std::io::ErrorKind::Other, format!("read of {} failed", path));
        (pending.done)(Err(AssetError::Io(error).into()));
        true
    }

    /// Deliver every parked read in request order, returning how many completed
    pub fn deliver_all(&self) -> usize {
        let parked: Vec<(PendingRead, Option<Vec<u8>>)> = {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.pending);
            pending
                .into_iter()
                .map(|p| {
                    let bytes = state.files.get(&p.path).cloned();
                    (p, bytes)
                })
                .collect()
        };
        let count = parked.len();
        for (pending, bytes) in parked {
            (pending.done)(Self::result_for(&pending.path, bytes));
        }
        count
    }

    fn result_for(path: &str, bytes: Option<Vec<u8>>) -> Result<Vec<u8>> {
        bytes.ok_or_else(|| AssetError::NotFound(path.to_string()).into())
    }
}

impl ByteSource for MemorySource {
    fn read(&self, path: &str, done: ReadCallback) {
        let immediate_bytes = {
            let mut state = self.state.lock();
            state.requests.push(path.to_string());
            if !self.immediate {
                state.pending.push(PendingRead {
                    path: path.to_string(),
                    done,
                });
                return;
            }
            state.files.get(path).cloned()
        };
        done(Self::result_for(path, immediate_bytes));
    }
}
