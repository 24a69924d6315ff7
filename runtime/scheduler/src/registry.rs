use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::attribute::Attribute;
use crate::error::RegistryError;
use crate::scheduler::{SchedulerInner, SchedulerRef};

// Thread-local registry context, installed on worker threads and inside
// `run` so handler code can reach the registry without threading it through.
thread_local! {
    static REGISTRY_STACK: RefCell<Vec<Registry>> = RefCell::new(Vec::new());
}

/// Directory of schedulers keyed by Attribute.
///
/// The registry never owns a scheduler: entries are weak, ownership stays
/// with whoever constructed the [`Scheduler`](crate::Scheduler), and a
/// scheduler removes itself on drop before its workers are joined. At most
/// one live scheduler is bound to any Attribute at a time.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    schedulers: Mutex<HashMap<Attribute, Weak<SchedulerInner>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scheduler bound to `attribute`, if one is alive.
    pub fn lookup(&self, attribute: &Attribute) -> Option<SchedulerRef> {
        let schedulers = self.inner.schedulers.lock();
        schedulers
            .get(attribute)
            .and_then(Weak::upgrade)
            .map(SchedulerRef::from_inner)
    }

    /// The registry installed for the current thread, if any. Sugar for
    /// handler code; prefer [`Context::registry`](crate::Context::registry).
    pub fn current() -> Option<Registry> {
        REGISTRY_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub(crate) fn register(
        &self,
        attribute: &Attribute,
        scheduler: &Arc<SchedulerInner>,
    ) -> Result<(), RegistryError> {
        let mut schedulers = self.inner.schedulers.lock();
        if let Some(existing) = schedulers.get(attribute) {
            if existing.upgrade().is_some() {
                return Err(RegistryError::AttributeTaken(attribute.clone()));
            }
        }
        schedulers.insert(attribute.clone(), Arc::downgrade(scheduler));
        Ok(())
    }

    pub(crate) fn unregister(&self, attribute: &Attribute, scheduler: &Arc<SchedulerInner>) {
        let mut schedulers = self.inner.schedulers.lock();
        if let Some(existing) = schedulers.get(attribute) {
            if existing.as_ptr() == Arc::as_ptr(scheduler) {
                schedulers.remove(attribute);
            }
        }
    }
}

/// RAII guard marking code as executing with a registry in scope.
pub struct RegistryScope {
    previous_len: usize,
}

impl RegistryScope {
    pub fn enter(registry: Registry) -> Self {
        let previous_len = REGISTRY_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let len = stack.len();
            stack.push(registry);
            len
        });
        Self { previous_len }
    }
}

impl Drop for RegistryScope {
    fn drop(&mut self) {
        REGISTRY_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.truncate(self.previous_len);
        });
    }
}
