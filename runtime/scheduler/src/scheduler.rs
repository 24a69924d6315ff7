use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::actor::{Actor, ActorCell};
use crate::attribute::Attribute;
use crate::error::{RegistryError, SendError};
use crate::group::{ErasedTypeGroup, TypeGroup};
use crate::registry::{Registry, RegistryScope};
use crate::stats::{SchedulerStats, StatsSnapshot};

/// Type-group map in insertion order. Workers walk `ordered`; `send` and
/// `spawn` resolve through `by_message`.
#[derive(Default)]
struct GroupMap {
    by_message: HashMap<TypeId, usize>,
    ordered: Vec<Arc<dyn ErasedTypeGroup>>,
}

impl GroupMap {
    fn get(&self, type_id: &TypeId) -> Option<Arc<dyn ErasedTypeGroup>> {
        self.by_message
            .get(type_id)
            .map(|&index| Arc::clone(&self.ordered[index]))
    }

    fn insert(&mut self, type_id: TypeId, group: Arc<dyn ErasedTypeGroup>) {
        self.by_message.insert(type_id, self.ordered.len());
        self.ordered.push(group);
    }

    fn snapshot(&self) -> Vec<Arc<dyn ErasedTypeGroup>> {
        self.ordered.clone()
    }
}

pub(crate) struct SchedulerInner {
    attribute: Attribute,
    registry: Registry,
    groups: RwLock<GroupMap>,
    running: AtomicBool,
    in_flight: AtomicUsize,
    worker_count: usize,
    stats: Arc<SchedulerStats>,
}

impl SchedulerInner {
    fn send<M: Send + 'static>(&self, msg: M) -> Result<(), SendError> {
        let group = { self.groups.read().get(&TypeId::of::<M>()) };
        let Some(group) = group else {
            debug!(
                scheduler = %self.attribute,
                message_type = std::any::type_name::<M>(),
                "send with no registered handler"
            );
            return Err(SendError::NoHandler {
                message_type: std::any::type_name::<M>(),
            });
        };
        if !group.has_members() {
            return Err(SendError::NoReceiver {
                message_type: std::any::type_name::<M>(),
            });
        }
        let typed = group
            .as_any()
            .downcast_ref::<TypeGroup<M>>()
            .expect("type group registered under a mismatched message type");
        typed.receive(msg)
    }

    fn spawn_with<A: Actor>(&self, actor: A) {
        if !self.running.load(Ordering::Acquire) {
            debug_assert!(false, "spawn on a stopped scheduler");
            return;
        }

        let type_id = TypeId::of::<A::Message>();
        let group = { self.groups.read().get(&type_id) };
        let group = match group {
            Some(group) => group,
            None => self.insert_group::<A::Message>(A::MAIN_THREAD_ONLY),
        };
        debug_assert_eq!(
            group.main_lane(),
            A::MAIN_THREAD_ONLY,
            "actor lane disagrees with its message type's existing group"
        );

        let typed = group
            .as_any()
            .downcast_ref::<TypeGroup<A::Message>>()
            .expect("type group registered under a mismatched message type");
        typed.spawn(Arc::new(ActorCell::new(actor)));
        debug!(
            scheduler = %self.attribute,
            message_type = group.message_type(),
            "actor spawned"
        );
    }

    fn insert_group<M: Send + 'static>(&self, main_lane: bool) -> Arc<dyn ErasedTypeGroup> {
        let mut groups = self.groups.write();
        let type_id = TypeId::of::<M>();
        // First writer wins; a racing spawn appends to the existing group.
        if let Some(existing) = groups.get(&type_id) {
            return existing;
        }
        let group: Arc<dyn ErasedTypeGroup> =
            Arc::new(TypeGroup::<M>::new(main_lane, Arc::clone(&self.stats)));
        groups.insert(type_id, Arc::clone(&group));
        group
    }

    fn block_until_empty(&self) {
        while self.running.load(Ordering::Acquire) {
            let has_messages = {
                self.groups
                    .read()
                    .snapshot()
                    .iter()
                    .any(|group| group.has_messages())
            };
            if !has_messages && self.in_flight.load(Ordering::Acquire) == 0 {
                break;
            }
            thread::yield_now();
        }
    }

    fn pending_messages(&self) -> usize {
        self.groups
            .read()
            .snapshot()
            .iter()
            .map(|group| group.pending_messages())
            .sum()
    }
}

/// Decrements the in-flight handler count when the handler returns.
pub(crate) struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Cloneable, non-owning handle to a scheduler. This is what the registry
/// hands out and what handlers see through their [`Context`](crate::Context).
#[derive(Clone)]
pub struct SchedulerRef {
    inner: Arc<SchedulerInner>,
}

impl SchedulerRef {
    pub(crate) fn from_inner(inner: Arc<SchedulerInner>) -> Self {
        Self { inner }
    }

    pub fn attribute(&self) -> &Attribute {
        &self.inner.attribute
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn send<M: Send + 'static>(&self, msg: M) -> Result<(), SendError> {
        self.inner.send(msg)
    }

    pub fn spawn<A: Actor + Default>(&self) {
        self.inner.spawn_with(A::default());
    }

    pub fn spawn_with<A: Actor>(&self, actor: A) {
        self.inner.spawn_with(actor);
    }

    /// Spins (yielding) until this scheduler has no queued messages and no
    /// handler in flight, or until it is stopped. Idleness is local: work
    /// this scheduler's handlers sent to sibling schedulers is not awaited.
    pub fn block_until_empty(&self) {
        self.inner.block_until_empty();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub(crate) fn in_flight_guard(&self) -> InFlightGuard<'_> {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: &self.inner.in_flight,
        }
    }

    /// One routing pass: main-lane groups first when called from the `run`
    /// caller, then the general lane. Groups are snapshotted under a short
    /// read lock; no scheduler-wide lock is held while a handler runs.
    fn process_one(&self, main_lane: bool) -> bool {
        let groups = { self.inner.groups.read().snapshot() };
        if main_lane {
            for group in groups.iter().filter(|group| group.main_lane()) {
                if group.try_process_one(self) {
                    return true;
                }
            }
        }
        for group in groups.iter().filter(|group| !group.main_lane()) {
            if group.try_process_one(self) {
                return true;
            }
        }
        false
    }

    fn worker_main(&self) {
        let _registry = RegistryScope::enter(self.inner.registry.clone());
        debug!(scheduler = %self.inner.attribute, "worker started");
        while self.inner.running.load(Ordering::Acquire) {
            if !self.process_one(false) {
                thread::yield_now();
            }
        }
        debug!(scheduler = %self.inner.attribute, "worker exiting");
    }

    fn run_on_caller(&self, until_empty: bool) {
        let _registry = RegistryScope::enter(self.inner.registry.clone());
        while self.inner.running.load(Ordering::Acquire) {
            if self.process_one(true) {
                continue;
            }
            if until_empty {
                // A handler still in flight may enqueue more work; only an
                // empty pass with nothing in flight means done.
                if self.inner.in_flight.load(Ordering::Acquire) > 0 {
                    thread::yield_now();
                    continue;
                }
                break;
            }
            thread::yield_now();
        }
    }
}

/// Owning handle: a worker pool plus the per-message-type groups, bound to
/// one Attribute and registered in a [`Registry`] for its lifetime.
///
/// The caller thread always counts as one worker; `worker_count - 1`
/// background threads are spawned. Dropping the scheduler unregisters it and
/// then stops and joins the pool.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        registry: &Registry,
        attribute: Attribute,
        worker_count: usize,
    ) -> Result<Self, RegistryError> {
        let worker_count = worker_count.max(1);
        let inner = Arc::new(SchedulerInner {
            attribute: attribute.clone(),
            registry: registry.clone(),
            groups: RwLock::new(GroupMap::default()),
            running: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            worker_count,
            stats: Arc::new(SchedulerStats::default()),
        });
        registry.register(&attribute, &inner)?;

        let mut workers = Vec::with_capacity(worker_count - 1);
        for index in 0..worker_count - 1 {
            let worker = SchedulerRef::from_inner(Arc::clone(&inner));
            let thread_name = format!("kestrel-{}-{}", attribute.name(), index);
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker.worker_main())
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        info!(
            scheduler = %attribute,
            workers = worker_count - 1,
            "scheduler started"
        );
        Ok(Self {
            inner,
            workers: Mutex::new(workers),
        })
    }

    /// A cloneable non-owning handle, equivalent to a registry lookup.
    pub fn handle(&self) -> SchedulerRef {
        SchedulerRef::from_inner(Arc::clone(&self.inner))
    }

    pub fn attribute(&self) -> &Attribute {
        &self.inner.attribute
    }

    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Spawns one actor of type `A`, creating its message type's group on
    /// first use. Idempotent with respect to group creation.
    pub fn spawn<A: Actor + Default>(&self) {
        self.inner.spawn_with(A::default());
    }

    /// Like [`spawn`](Self::spawn) for actors that carry captured state.
    pub fn spawn_with<A: Actor>(&self, actor: A) {
        self.inner.spawn_with(actor);
    }

    pub fn send<M: Send + 'static>(&self, msg: M) -> Result<(), SendError> {
        self.inner.send(msg)
    }

    /// Lets the calling thread participate as a worker. This is the only
    /// path that drains main-lane groups; the caller tries those first and
    /// steals general work when the main lane is idle.
    ///
    /// With `until_empty` the call returns the first time a full pass finds
    /// no work and no handler remains in flight; otherwise it loops until
    /// [`stop`](Self::stop).
    pub fn run(&self, until_empty: bool) {
        self.handle().run_on_caller(until_empty);
    }

    pub fn block_until_empty(&self) {
        self.inner.block_until_empty();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Signals workers to exit at their next idle check and joins them.
    /// In-flight handlers complete; messages still queued are discarded.
    /// Idempotent. Must not be called from inside a handler.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        let pending = self.inner.pending_messages();
        if pending > 0 {
            self.inner.stats.record_discarded_at_stop(pending as u64);
            debug!(
                scheduler = %self.inner.attribute,
                pending, "discarding messages queued at stop"
            );
        }
        info!(scheduler = %self.inner.attribute, "scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Unbind the Attribute first so lookups cannot resurrect a handle
        // to a scheduler that is about to join its workers.
        self.inner
            .registry
            .unregister(&self.inner.attribute, &self.inner);
        self.stop();
    }
}
