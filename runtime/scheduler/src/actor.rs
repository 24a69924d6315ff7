use parking_lot::Mutex;

use crate::context::Context;
use crate::mailbox::{Mailbox, Pop};
use crate::scheduler::SchedulerRef;

/// A user-defined handler bound to exactly one message type.
///
/// Handlers are synchronous and run to completion; at most one handler
/// invocation is in progress per actor at any time, and each actor observes
/// its mailbox in FIFO order. A handler may freely send, spawn, and look up
/// sibling schedulers through the [`Context`] it receives.
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    /// Actors of a main-thread-only type are dispatched exclusively by the
    /// thread that calls [`Scheduler::run`](crate::Scheduler::run), never by
    /// pool workers. Meant for collaborators whose underlying API is bound
    /// to one thread.
    const MAIN_THREAD_ONLY: bool = false;

    fn handle(&mut self, ctx: &Context<'_>, msg: Self::Message);
}

/// What a single `try_process_one` attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessOutcome {
    /// One message was popped and its handler ran to completion.
    Processed,
    /// Nothing queued.
    Empty,
    /// The draining flag was observed under the process lock; the group must
    /// remove this member and redistribute its mailbox.
    Draining,
    /// Another worker holds the execution lock.
    Busy,
}

/// Surface through which a handler frees its own actor.
pub(crate) trait CellControl {
    fn queue_free(&self);
}

/// Actor-type-erased view of a cell, stored by its `TypeGroup`.
pub(crate) trait GroupMember<M>: Send + Sync {
    fn receive(&self, msg: M) -> Result<(), M>;
    fn try_process_one(&self, scheduler: &SchedulerRef) -> ProcessOutcome;
    fn is_draining(&self) -> bool;
    fn has_messages(&self) -> bool;
    fn pending_len(&self) -> usize;
    fn drain_into(&self, sink: &mut Vec<M>);
}

/// Pairs the actor state with its mailbox. The state mutex is the execution
/// lock: it is held across the handler, which is what serialises a single
/// actor, while the mailbox keeps its own lock so reentrant sends (including
/// self-sends) never contend with a running handler.
pub(crate) struct ActorCell<A: Actor> {
    state: Mutex<A>,
    mailbox: Mailbox<A::Message>,
}

impl<A: Actor> ActorCell<A> {
    pub(crate) fn new(actor: A) -> Self {
        Self {
            state: Mutex::new(actor),
            mailbox: Mailbox::new(),
        }
    }
}

impl<A: Actor> CellControl for ActorCell<A> {
    fn queue_free(&self) {
        self.mailbox.queue_free();
    }
}

impl<A: Actor> GroupMember<A::Message> for ActorCell<A> {
    fn receive(&self, msg: A::Message) -> Result<(), A::Message> {
        self.mailbox.push(msg)
    }

    fn try_process_one(&self, scheduler: &SchedulerRef) -> ProcessOutcome {
        // Workers compete with try_lock and skip a busy actor rather than
        // queue behind its handler.
        let Some(mut state) = self.state.try_lock() else {
            return ProcessOutcome::Busy;
        };

        let mut in_flight = None;
        let popped = self
            .mailbox
            .pop_front_with(|| in_flight = Some(scheduler.in_flight_guard()));
        let msg = match popped {
            Pop::Message(msg) => msg,
            Pop::Empty => return ProcessOutcome::Empty,
            Pop::Draining => return ProcessOutcome::Draining,
        };

        let ctx = Context::new(scheduler, self);
        state.handle(&ctx, msg);
        drop(in_flight);

        ProcessOutcome::Processed
    }

    fn is_draining(&self) -> bool {
        self.mailbox.is_draining()
    }

    fn has_messages(&self) -> bool {
        self.mailbox.has_messages()
    }

    fn pending_len(&self) -> usize {
        self.mailbox.len()
    }

    fn drain_into(&self, sink: &mut Vec<A::Message>) {
        self.mailbox.drain_into(sink);
    }
}
