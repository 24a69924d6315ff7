use crate::actor::{Actor, CellControl};
use crate::attribute::Attribute;
use crate::error::SendError;
use crate::registry::Registry;
use crate::scheduler::SchedulerRef;

/// Immutable view handed to every handler invocation.
///
/// Carries the owning scheduler, the registry it was built from, and a
/// control surface for the actor currently being driven. Everything a
/// handler may legally do mid-message goes through here; handlers hold no
/// scheduler-wide locks, so all of these calls are deadlock-free.
pub struct Context<'a> {
    scheduler: &'a SchedulerRef,
    cell: &'a dyn CellControl,
}

impl<'a> Context<'a> {
    pub(crate) fn new(scheduler: &'a SchedulerRef, cell: &'a dyn CellControl) -> Self {
        Self { scheduler, cell }
    }

    /// The scheduler driving this handler.
    pub fn scheduler(&self) -> &SchedulerRef {
        self.scheduler
    }

    pub fn registry(&self) -> &Registry {
        self.scheduler.registry()
    }

    pub fn attribute(&self) -> &Attribute {
        self.scheduler.attribute()
    }

    /// Sends to any actor in this scheduler accepting `M`. A self-send
    /// enqueues on the current actor's own mailbox.
    pub fn send<M: Send + 'static>(&self, msg: M) -> Result<(), SendError> {
        self.scheduler.send(msg)
    }

    /// Spawns one more actor of type `A` in this scheduler.
    pub fn spawn<A: Actor + Default>(&self) {
        self.scheduler.spawn::<A>();
    }

    pub fn spawn_with<A: Actor>(&self, actor: A) {
        self.scheduler.spawn_with(actor);
    }

    /// Looks up a sibling scheduler by tag.
    pub fn lookup(&self, attribute: &Attribute) -> Option<SchedulerRef> {
        self.registry().lookup(attribute)
    }

    /// Queues the current actor to be freed. No further messages will reach
    /// it; whatever remains in its mailbox is redistributed to the other
    /// actors of the same message type once the scheduler observes the flag.
    pub fn queue_free(&self) {
        self.cell.queue_free();
    }
}
