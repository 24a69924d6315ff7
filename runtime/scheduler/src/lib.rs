//! Typed actor scheduler: dispatches messages of arbitrary user-defined
//! types to registered actors, processes them across a bounded pool of OS
//! worker threads, and routes work between independently tagged schedulers
//! through a registry.
//!
//! Each actor accepts exactly one message type and observes its mailbox in
//! FIFO order with at most one handler invocation in progress at a time.
//! Within a scheduler, all actors of one message type form a group; sends
//! pick a group member uniformly at random, and an actor queued for freeing
//! hands its backlog back to the surviving members. Actor types may opt into
//! the main-thread lane, which is drained only by the thread that calls
//! [`Scheduler::run`], intended for collaborators (windowing, graphics)
//! whose APIs are bound to one thread.

mod actor;
mod attribute;
mod context;
mod error;
mod group;
mod mailbox;
mod messaging;
mod registry;
mod scheduler;
mod stats;

pub use actor::Actor;
pub use attribute::Attribute;
pub use context::Context;
pub use error::{RegistryError, SendError};
pub use messaging::{MessageQueue, QueueDirectory, QueueId};
pub use registry::{Registry, RegistryScope};
pub use scheduler::{Scheduler, SchedulerRef};
pub use stats::StatsSnapshot;

use tracing::debug;

#[derive(Default)]
struct Widen;

impl Actor for Widen {
    type Message = i32;

    fn handle(&mut self, ctx: &Context<'_>, msg: i32) {
        debug!(value = msg, "widening");
        if let Some(presenter) = ctx.lookup(&Attribute::rendering()) {
            let _ = presenter.send(msg as f32);
        }
    }
}

#[derive(Default)]
struct Present;

impl Actor for Present {
    type Message = f32;

    const MAIN_THREAD_ONLY: bool = true;

    fn handle(&mut self, _ctx: &Context<'_>, msg: f32) {
        debug!(value = msg, "presenting");
    }
}

/// Convenience helper wiring the classic two-scheduler pipeline: a compute
/// scheduler widens integers and forwards them to a main-thread presenter
/// scheduler. Returns once both schedulers have drained.
pub fn demo_pipeline() {
    let registry = Registry::new();
    let compute =
        Scheduler::new(&registry, Attribute::regular(), 2).expect("create compute scheduler");
    let presenter =
        Scheduler::new(&registry, Attribute::rendering(), 1).expect("create presenter scheduler");

    compute.spawn::<Widen>();
    presenter.spawn::<Present>();

    for value in 0..10_i32 {
        compute.send(value).expect("send work");
    }
    compute.block_until_empty();
    presenter.run(true);
}
