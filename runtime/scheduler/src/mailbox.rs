use std::collections::VecDeque;

use parking_lot::Mutex;

/// Result of a pop attempt, observed atomically with the draining flag.
pub(crate) enum Pop<M> {
    Message(M),
    Empty,
    Draining,
}

struct MailboxInner<M> {
    queue: VecDeque<M>,
    draining: bool,
}

/// Per-actor FIFO. The one lock guards both the queue and the draining flag,
/// so a drain request takes effect exactly at the next pop attempt and never
/// in the middle of one.
pub(crate) struct Mailbox<M> {
    inner: Mutex<MailboxInner<M>>,
}

impl<M> Mailbox<M> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(MailboxInner {
                queue: VecDeque::new(),
                draining: false,
            }),
        }
    }

    /// Enqueues a message, or hands it back if the mailbox is draining.
    pub(crate) fn push(&self, msg: M) -> Result<(), M> {
        let mut inner = self.inner.lock();
        if inner.draining {
            return Err(msg);
        }
        inner.queue.push_back(msg);
        Ok(())
    }

    /// Pops the front message unless the mailbox is draining. `on_pop` runs
    /// while the lock is still held, so an idle check can never observe an
    /// empty queue before the caller has accounted for the popped message.
    pub(crate) fn pop_front_with(&self, on_pop: impl FnOnce()) -> Pop<M> {
        let mut inner = self.inner.lock();
        if inner.draining {
            return Pop::Draining;
        }
        match inner.queue.pop_front() {
            Some(msg) => {
                on_pop();
                Pop::Message(msg)
            }
            None => Pop::Empty,
        }
    }

    /// Empties the queue into `sink`, preserving order.
    pub(crate) fn drain_into(&self, sink: &mut Vec<M>) {
        let mut inner = self.inner.lock();
        sink.extend(inner.queue.drain(..));
    }

    /// Marks the mailbox as draining. Idempotent.
    pub(crate) fn queue_free(&self) {
        self.inner.lock().draining = true;
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    pub(crate) fn has_messages(&self) -> bool {
        !self.inner.lock().queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }
}
