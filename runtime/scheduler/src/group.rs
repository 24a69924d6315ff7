use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::actor::{GroupMember, ProcessOutcome};
use crate::error::SendError;
use crate::scheduler::SchedulerRef;
use crate::stats::SchedulerStats;

/// Object-safe face of a `TypeGroup`, stored in the scheduler's map.
pub(crate) trait ErasedTypeGroup: Send + Sync {
    fn try_process_one(&self, scheduler: &SchedulerRef) -> bool;
    fn has_messages(&self) -> bool;
    fn has_members(&self) -> bool;
    fn pending_messages(&self) -> usize;
    fn main_lane(&self) -> bool;
    fn message_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

/// Every actor accepting one concrete message type inside one scheduler.
///
/// Receive spreads load by picking a live member uniformly at random;
/// processing walks members in insertion order so draining stays
/// predictable. The member lock is never held across a handler.
pub(crate) struct TypeGroup<M: Send + 'static> {
    members: Mutex<Vec<Arc<dyn GroupMember<M>>>>,
    rng: Mutex<SmallRng>,
    main_lane: bool,
    message_type: &'static str,
    stats: Arc<SchedulerStats>,
}

impl<M: Send + 'static> TypeGroup<M> {
    pub(crate) fn new(main_lane: bool, stats: Arc<SchedulerStats>) -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            rng: Mutex::new(SmallRng::from_entropy()),
            main_lane,
            message_type: std::any::type_name::<M>(),
            stats,
        }
    }

    pub(crate) fn spawn(&self, member: Arc<dyn GroupMember<M>>) {
        self.members.lock().push(member);
    }

    /// Routes a message sent to this scheduler. Counted as accepted only
    /// here; redistribution re-routes without touching the counter.
    pub(crate) fn receive(&self, msg: M) -> Result<(), SendError> {
        self.route(msg)?;
        self.stats.record_accepted();
        Ok(())
    }

    fn route(&self, mut msg: M) -> Result<(), SendError> {
        loop {
            let target = {
                let members = self.members.lock();
                let live: Vec<&Arc<dyn GroupMember<M>>> =
                    members.iter().filter(|m| !m.is_draining()).collect();
                if live.is_empty() {
                    return Err(SendError::NoReceiver {
                        message_type: self.message_type,
                    });
                }
                let index = self.rng.lock().gen_range(0..live.len());
                Arc::clone(live[index])
            };
            match target.receive(msg) {
                Ok(()) => return Ok(()),
                // The member started draining between selection and push;
                // it hands the message back and the next round excludes it.
                Err(returned) => msg = returned,
            }
        }
    }

    /// Removes `member` if it is draining and redistributes its mailbox.
    /// The removal happens under the member lock, so exactly one caller
    /// redistributes any given actor.
    fn reap(&self, member: &Arc<dyn GroupMember<M>>) {
        let removed = {
            let mut members = self.members.lock();
            match members.iter().position(|m| Arc::ptr_eq(m, member)) {
                Some(position) if member.is_draining() => Some(members.remove(position)),
                _ => None,
            }
        };
        if let Some(removed) = removed {
            self.redistribute(removed.as_ref());
        }
    }

    fn redistribute(&self, member: &dyn GroupMember<M>) {
        let mut pending = Vec::new();
        member.drain_into(&mut pending);
        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        let mut dropped = 0usize;
        for msg in pending {
            if self.route(msg).is_err() {
                dropped += 1;
            }
        }

        if dropped > 0 {
            self.stats.record_redistribution_dropped(dropped as u64);
            warn!(
                message_type = self.message_type,
                dropped, "dropped messages while redistributing a drained mailbox"
            );
        } else {
            debug!(
                message_type = self.message_type,
                total, "redistributed drained mailbox"
            );
        }
    }
}

impl<M: Send + 'static> ErasedTypeGroup for TypeGroup<M> {
    fn try_process_one(&self, scheduler: &SchedulerRef) -> bool {
        let members: Vec<Arc<dyn GroupMember<M>>> = self.members.lock().clone();
        for member in members {
            match member.try_process_one(scheduler) {
                ProcessOutcome::Processed => {
                    self.stats.record_delivered();
                    // The handler may have queue-freed its own actor.
                    if member.is_draining() {
                        self.reap(&member);
                    }
                    return true;
                }
                ProcessOutcome::Draining => {
                    // Queue-freed while idle; reap now so its backlog moves
                    // to the surviving members, then keep scanning.
                    self.reap(&member);
                }
                ProcessOutcome::Empty | ProcessOutcome::Busy => {}
            }
        }
        false
    }

    fn has_messages(&self) -> bool {
        self.members.lock().iter().any(|m| m.has_messages())
    }

    fn has_members(&self) -> bool {
        !self.members.lock().is_empty()
    }

    fn pending_messages(&self) -> usize {
        self.members.lock().iter().map(|m| m.pending_len()).sum()
    }

    fn main_lane(&self) -> bool {
        self.main_lane
    }

    fn message_type(&self) -> &'static str {
        self.message_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
