use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use kestrel_runtime_scheduler::{
    Actor, Attribute, Context, Registry, Scheduler, SendError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Collect {
    tx: Sender<i32>,
}

impl Actor for Collect {
    type Message = i32;

    fn handle(&mut self, _ctx: &Context<'_>, msg: i32) {
        self.tx.send(msg).expect("collect channel");
    }
}

#[test]
fn single_type_echo_preserves_fifo() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("echo"), 2).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(Collect { tx });

    scheduler.send(1).expect("send 1");
    scheduler.send(2).expect("send 2");
    scheduler.send(3).expect("send 3");
    scheduler.block_until_empty();
    scheduler.stop();

    let observed: Vec<i32> = rx.try_iter().collect();
    assert_eq!(observed, vec![1, 2, 3]);
}

struct IntRelay;

impl Actor for IntRelay {
    type Message = i32;

    fn handle(&mut self, ctx: &Context<'_>, msg: i32) {
        let presenter = ctx
            .lookup(&Attribute::rendering())
            .expect("rendering scheduler registered");
        presenter.send(msg as f32).expect("forward as float");
    }
}

struct FloatCollect {
    tx: Sender<f32>,
}

impl Actor for FloatCollect {
    type Message = f32;

    fn handle(&mut self, _ctx: &Context<'_>, msg: f32) {
        self.tx.send(msg).expect("float channel");
    }
}

#[test]
fn handler_hops_to_sibling_scheduler() {
    init_tracing();
    let registry = Registry::new();
    let compute =
        Scheduler::new(&registry, Attribute::regular(), 2).expect("create compute scheduler");
    let presenter =
        Scheduler::new(&registry, Attribute::rendering(), 2).expect("create presenter scheduler");

    compute.spawn_with(IntRelay);
    let (tx, rx) = unbounded();
    presenter.spawn_with(FloatCollect { tx });

    compute.send(7).expect("send int");
    compute.block_until_empty();
    presenter.block_until_empty();

    let observed: Vec<f32> = rx.try_iter().collect();
    assert_eq!(observed, vec![7.0]);
}

struct Tick;

struct TickWitness {
    tx: Sender<thread::ThreadId>,
}

impl Actor for TickWitness {
    type Message = Tick;

    const MAIN_THREAD_ONLY: bool = true;

    fn handle(&mut self, _ctx: &Context<'_>, _msg: Tick) {
        self.tx.send(thread::current().id()).expect("tick channel");
    }
}

#[test]
fn main_lane_runs_only_on_the_calling_thread() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("main-lane"), 4).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(TickWitness { tx });

    for _ in 0..5 {
        scheduler.send(Tick).expect("send tick");
    }
    // Give the pool a moment; workers must leave the main lane untouched.
    thread::sleep(Duration::from_millis(20));
    assert!(rx.is_empty());

    scheduler.run(true);
    scheduler.stop();

    let observed: Vec<thread::ThreadId> = rx.try_iter().collect();
    assert_eq!(observed.len(), 5);
    let main_thread = thread::current().id();
    assert!(observed.iter().all(|id| *id == main_thread));
}

struct Tagged {
    tag: u8,
    free_after_first: bool,
    seen: usize,
    tx: Sender<(u8, u32)>,
}

impl Actor for Tagged {
    type Message = u32;

    fn handle(&mut self, ctx: &Context<'_>, msg: u32) {
        self.tx.send((self.tag, msg)).expect("tagged channel");
        self.seen += 1;
        if self.free_after_first && self.seen == 1 {
            ctx.queue_free();
        }
    }
}

#[test]
fn drained_actor_redistributes_to_survivor() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("drain"), 1).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(Tagged {
        tag: 1,
        free_after_first: true,
        seen: 0,
        tx: tx.clone(),
    });
    scheduler.spawn_with(Tagged {
        tag: 2,
        free_after_first: false,
        seen: 0,
        tx,
    });

    for value in 0..100_u32 {
        scheduler.send(value).expect("send work");
    }
    scheduler.run(true);

    let observed: Vec<(u8, u32)> = rx.try_iter().collect();
    assert_eq!(observed.len(), 100);
    let first_actor = observed.iter().filter(|(tag, _)| *tag == 1).count();
    assert!(first_actor <= 1, "freed actor kept processing");

    let mut values: Vec<u32> = observed.into_iter().map(|(_, value)| value).collect();
    values.sort_unstable();
    assert_eq!(values, (0..100).collect::<Vec<u32>>());

    let stats = scheduler.stats();
    assert_eq!(stats.accepted, 100);
    assert_eq!(stats.delivered, 100);
    assert_eq!(stats.redistribution_dropped, 0);
}

struct SelfFree {
    tx: Sender<u32>,
}

impl Actor for SelfFree {
    type Message = u32;

    fn handle(&mut self, ctx: &Context<'_>, msg: u32) {
        self.tx.send(msg).expect("self-free channel");
        ctx.queue_free();
    }
}

struct Ping;

#[test]
fn send_without_handler_or_receiver_fails_explicitly() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("empty"), 1).expect("create scheduler");

    assert!(matches!(
        scheduler.send(Ping),
        Err(SendError::NoHandler { .. })
    ));

    let (tx, rx) = unbounded();
    scheduler.spawn_with(SelfFree { tx });
    scheduler.send(1_u32).expect("send to live actor");
    scheduler.run(true);
    assert_eq!(rx.try_iter().collect::<Vec<u32>>(), vec![1]);

    // The only actor freed itself; the group survives with no live member.
    assert!(matches!(
        scheduler.send(2_u32),
        Err(SendError::NoReceiver { .. })
    ));
}

#[test]
fn redistribution_drops_when_no_survivor_remains() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("drop"), 1).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(SelfFree { tx });

    for value in 0..50_u32 {
        scheduler.send(value).expect("send work");
    }
    scheduler.run(true);

    assert_eq!(rx.try_iter().count(), 1);
    let stats = scheduler.stats();
    assert_eq!(stats.accepted, 50);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.redistribution_dropped, 49);
    assert_eq!(stats.accounted(), stats.accepted);
}

#[derive(Default)]
struct Sleeper;

impl Actor for Sleeper {
    type Message = u64;

    fn handle(&mut self, _ctx: &Context<'_>, _msg: u64) {
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn stop_mid_run_discards_pending_and_joins() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("stop-mid-run"), 3).expect("create scheduler");
    scheduler.spawn::<Sleeper>();

    for value in 0..1000_u64 {
        scheduler.send(value).expect("send work");
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while scheduler.stats().delivered < 10 {
        assert!(Instant::now() < deadline, "pool never made progress");
        thread::sleep(Duration::from_millis(1));
    }
    scheduler.stop();

    let stats = scheduler.stats();
    assert!(stats.delivered >= 10);
    assert!(stats.delivered < 1000, "stop arrived after full drain");
    assert_eq!(stats.accepted, 1000);
    assert_eq!(stats.accounted(), stats.accepted);

    // All workers are joined; a blocking run on the stopped pool returns.
    scheduler.run(false);
}

#[test]
fn fifo_holds_under_worker_contention() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("fifo-stress"), 4).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(Collect { tx });

    for value in 0..500 {
        scheduler.send(value).expect("send work");
    }
    scheduler.block_until_empty();
    scheduler.stop();

    let observed: Vec<i32> = rx.try_iter().collect();
    assert_eq!(observed, (0..500).collect::<Vec<i32>>());
}

struct Overlap {
    active: Arc<AtomicBool>,
    violated: Arc<AtomicBool>,
}

impl Actor for Overlap {
    type Message = u32;

    fn handle(&mut self, _ctx: &Context<'_>, _msg: u32) {
        if self.active.swap(true, Ordering::SeqCst) {
            self.violated.store(true, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(100));
        self.active.store(false, Ordering::SeqCst);
    }
}

#[test]
fn handlers_never_overlap_for_one_actor() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("overlap"), 4).expect("create scheduler");
    let violated = Arc::new(AtomicBool::new(false));
    scheduler.spawn_with(Overlap {
        active: Arc::new(AtomicBool::new(false)),
        violated: Arc::clone(&violated),
    });

    for value in 0..200_u32 {
        scheduler.send(value).expect("send work");
    }
    scheduler.block_until_empty();
    scheduler.stop();

    assert!(!violated.load(Ordering::SeqCst));
    assert_eq!(scheduler.stats().delivered, 200);
}

struct CountOne {
    counter: Arc<AtomicUsize>,
}

impl Actor for CountOne {
    type Message = u32;

    fn handle(&mut self, _ctx: &Context<'_>, _msg: u32) {
        self.counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn random_routing_spreads_work_without_loss() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("spread"), 4).expect("create scheduler");

    let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for counter in &counters {
        scheduler.spawn_with(CountOne {
            counter: Arc::clone(counter),
        });
    }

    for value in 0..3000_u32 {
        scheduler.send(value).expect("send work");
    }
    scheduler.block_until_empty();
    scheduler.stop();

    let per_actor: Vec<usize> = counters
        .iter()
        .map(|counter| counter.load(Ordering::Relaxed))
        .collect();
    assert_eq!(per_actor.iter().sum::<usize>(), 3000);
    assert!(
        per_actor.iter().all(|&count| count > 0),
        "uniform routing starved an actor: {per_actor:?}"
    );
}

struct SpawnedCollect {
    tx: Sender<i64>,
}

impl Actor for SpawnedCollect {
    type Message = i64;

    fn handle(&mut self, _ctx: &Context<'_>, msg: i64) {
        self.tx.send(msg).expect("spawned channel");
    }
}

struct Bootstrap {
    tx: Sender<i64>,
}

impl Actor for Bootstrap {
    type Message = u8;

    fn handle(&mut self, ctx: &Context<'_>, _msg: u8) {
        ctx.spawn_with(SpawnedCollect {
            tx: self.tx.clone(),
        });
        ctx.send(99_i64).expect("send to freshly spawned actor");
    }
}

#[test]
fn handlers_can_spawn_new_actor_types() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("bootstrap"), 2).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(Bootstrap { tx });

    scheduler.send(1_u8).expect("send trigger");
    scheduler.block_until_empty();
    scheduler.stop();

    assert_eq!(rx.try_iter().collect::<Vec<i64>>(), vec![99]);
}

struct RegistryProbe {
    tx: Sender<bool>,
}

impl Actor for RegistryProbe {
    type Message = u32;

    fn handle(&mut self, _ctx: &Context<'_>, _msg: u32) {
        self.tx
            .send(Registry::current().is_some())
            .expect("probe channel");
    }
}

#[test]
fn registry_scope_is_visible_inside_handlers() {
    init_tracing();
    let registry = Registry::new();
    let scheduler =
        Scheduler::new(&registry, Attribute::create("scope"), 2).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(RegistryProbe { tx });

    scheduler.send(0_u32).expect("send probe");
    scheduler.block_until_empty();
    scheduler.stop();

    assert_eq!(rx.try_iter().collect::<Vec<bool>>(), vec![true]);
}

#[test]
fn registry_lookup_reaches_the_same_scheduler() {
    init_tracing();
    let registry = Registry::new();
    let attribute = Attribute::create("lookup");
    let scheduler = Scheduler::new(&registry, attribute.clone(), 2).expect("create scheduler");
    let (tx, rx) = unbounded();
    scheduler.spawn_with(Collect { tx });

    let via_registry = registry.lookup(&attribute).expect("registered scheduler");
    assert_eq!(via_registry.attribute(), &attribute);
    via_registry.send(42).expect("send through handle");
    scheduler.block_until_empty();
    scheduler.stop();

    assert_eq!(rx.try_iter().collect::<Vec<i32>>(), vec![42]);
    drop(scheduler);
    assert!(registry.lookup(&attribute).is_none());
}
