// Deferred release of native handles
//
// Wrappers may be dropped anywhere, but native objects are freed by their
// device at the end of the frame, after the last draw that could use them.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Queue of handles waiting to be freed by their owning device
pub struct ReleaseQueue<H> {
    sender: Sender<H>,
    receiver: Receiver<H>,
}

impl<H> ReleaseQueue<H> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Sending side handed to every wrapper the device creates
    pub fn releaser(&self) -> Releaser<H> {
        Releaser {
            sender: self.sender.clone(),
        }
    }

    /// Take every queued handle
    pub fn drain(&self) -> Vec<H> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued handles
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<H> Default for ReleaseQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle sink held by wrappers; sending after the device is gone is a no-op
pub struct Releaser<H> {
    sender: Sender<H>,
}

impl<H> Releaser<H> {
    pub fn release(&self, handle: H) {
        let _ = self.sender.send(handle);
    }
}

impl<H> Clone for Releaser<H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
