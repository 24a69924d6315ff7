use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(1);

pub type QueueId = u32;

/// Standalone keyed FIFO, independent of the actor machinery. Useful for
/// out-of-band plumbing between threads that is not worth an actor type.
pub struct MessageQueue<M> {
    id: QueueId,
    messages: Mutex<VecDeque<M>>,
}

impl<M: Send> MessageQueue<M> {
    fn new() -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::SeqCst),
            messages: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn push(&self, msg: M) {
        self.messages.lock().push_back(msg);
    }

    pub fn pop_front(&self) -> Option<M> {
        self.messages.lock().pop_front()
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Drops everything queued; returns how many messages were discarded.
    pub fn clear(&self) -> usize {
        let mut messages = self.messages.lock();
        let discarded = messages.len();
        messages.clear();
        discarded
    }
}

/// Directory of queues by id. Holds only weak references: a queue dies when
/// its last outside handle drops, and stale directory entries simply stop
/// resolving.
pub struct QueueDirectory<M> {
    inner: Arc<Mutex<HashMap<QueueId, Weak<MessageQueue<M>>>>>,
}

impl<M> Clone for QueueDirectory<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for QueueDirectory<M> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<M: Send> QueueDirectory<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue and registers it under its freshly minted id.
    pub fn create(&self) -> Arc<MessageQueue<M>> {
        let queue = Arc::new(MessageQueue::new());
        self.inner.lock().insert(queue.id, Arc::downgrade(&queue));
        queue
    }

    pub fn lookup(&self, id: QueueId) -> Option<Arc<MessageQueue<M>>> {
        let mut queues = self.inner.lock();
        match queues.get(&id).and_then(Weak::upgrade) {
            Some(queue) => Some(queue),
            None => {
                queues.remove(&id);
                None
            }
        }
    }

    pub fn remove(&self, id: QueueId) {
        self.inner.lock().remove(&id);
    }
}
