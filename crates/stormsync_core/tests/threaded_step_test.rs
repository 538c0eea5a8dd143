//! Integration tests for a full threaded step: launch, privilege hand-off,
//! storm barrier, join.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use rand::Rng;
use stormsync_core::{
    BarrierRole, DomainId, IntegrationContext, IntegrationSettings, SpawnError, ThreadAttributes,
};

/// Workers in these tests do almost nothing; keep their stacks small.
const TEST_STACK: usize = 1024 * 1024;

/// Long enough for a released thread to report, short enough to keep the
/// suite fast when asserting that a thread stays blocked.
const BLOCKED_WINDOW: Duration = Duration::from_millis(200);
const RELEASE_WINDOW: Duration = Duration::from_secs(5);

fn d(raw: u32) -> DomainId {
    DomainId::new(raw).unwrap()
}

fn context(max_domains: usize, storms: &[u32]) -> IntegrationContext {
    let settings = IntegrationSettings::new(max_domains)
        .with_storms(storms.iter().map(|&s| d(s)).collect())
        .with_attributes(ThreadAttributes::with_stack_size(TEST_STACK).unwrap());
    IntegrationContext::initialize(settings).unwrap()
}

#[test]
fn test_round_trip_regardless_of_duration() {
    let mut ctx = context(8, &[]);
    let mut rng = rand::thread_rng();

    for _ in 0..5 {
        let mut launched = Vec::new();
        for raw in 1..=8 {
            if rng.gen_bool(0.5) {
                let millis = rng.gen_range(0..25);
                ctx.launch_domain(d(raw), move |_| {
                    std::thread::sleep(Duration::from_millis(millis));
                })
                .unwrap();
                launched.push(d(raw));
            }
        }

        let report = ctx.wait_all_domains();
        assert_eq!(report.joined, launched);
        assert_eq!(ctx.registry().active_count(), 0);
        assert!(ctx.wait_all_domains().is_empty());
    }
}

#[test]
fn test_only_granted_domain_proceeds() {
    let mut ctx = context(3, &[2, 3]);
    let (tx, rx) = crossbeam_channel::unbounded();

    for raw in [2, 3] {
        let gate = ctx.privilege();
        let tx = tx.clone();
        ctx.launch_domain(d(raw), move |domain| {
            gate.await_privilege(domain).unwrap();
            tx.send(domain).unwrap();
        })
        .unwrap();
    }

    // Holder is domain 1: both workers are parked.
    assert_eq!(rx.recv_timeout(BLOCKED_WINDOW), Err(RecvTimeoutError::Timeout));

    ctx.grant_privilege(d(2)).unwrap();
    assert_eq!(rx.recv_timeout(RELEASE_WINDOW), Ok(d(2)));
    // Domain 3 woke up, saw it is not the holder and went back to sleep.
    assert_eq!(rx.recv_timeout(BLOCKED_WINDOW), Err(RecvTimeoutError::Timeout));

    ctx.grant_privilege(d(3)).unwrap();
    assert_eq!(rx.recv_timeout(RELEASE_WINDOW), Ok(d(3)));

    let report = ctx.wait_all_domains();
    assert_eq!(report.joined, vec![d(2), d(3)]);
}

#[test]
fn test_never_granted_waiter_stays_blocked() {
    let mut ctx = context(4, &[]);
    let gate = ctx.privilege();
    let (tx, rx) = crossbeam_channel::unbounded();

    let waiter_gate = ctx.privilege();
    ctx.launch_domain(d(4), move |domain| {
        waiter_gate.await_privilege(domain).unwrap();
        tx.send(domain).unwrap();
    })
    .unwrap();

    // Grants to everybody else do not release it.
    for raw in [2, 3, 1] {
        gate.grant_privilege(d(raw)).unwrap();
        assert_eq!(rx.recv_timeout(BLOCKED_WINDOW), Err(RecvTimeoutError::Timeout));
    }
    gate.wake_all();
    assert_eq!(rx.recv_timeout(BLOCKED_WINDOW), Err(RecvTimeoutError::Timeout));
    assert!(ctx.registry().slot(d(4)).unwrap().is_active());

    // Release it so the worker can be joined.
    gate.grant_privilege(d(4)).unwrap();
    assert_eq!(rx.recv_timeout(RELEASE_WINDOW), Ok(d(4)));
    assert_eq!(ctx.wait_all_domains().joined, vec![d(4)]);
}

#[test]
fn test_storm_workers_meet_at_barrier() {
    let mut ctx = context(9, &[2, 5, 8]);
    let (tx, rx) = crossbeam_channel::unbounded();
    let arrived = Arc::new(AtomicUsize::new(0));

    for &domain in &[d(2), d(5)] {
        let barrier = ctx.barrier();
        let tx = tx.clone();
        let arrived = Arc::clone(&arrived);
        ctx.launch_domain(domain, move |_| {
            arrived.fetch_add(1, Ordering::SeqCst);
            tx.send(barrier.arrive()).unwrap();
        })
        .unwrap();
    }

    assert_eq!(rx.recv_timeout(BLOCKED_WINDOW), Err(RecvTimeoutError::Timeout));

    let barrier = ctx.barrier();
    let tx_last = tx.clone();
    ctx.launch_domain(d(8), move |_| {
        tx_last.send(barrier.arrive()).unwrap();
    })
    .unwrap();

    let roles: Vec<BarrierRole> = (0..3)
        .map(|_| rx.recv_timeout(RELEASE_WINDOW).unwrap())
        .collect();
    assert_eq!(roles.iter().filter(|r| r.is_serial()).count(), 1);
    assert_eq!(arrived.load(Ordering::SeqCst), 2);

    assert_eq!(ctx.wait_all_domains().worker_count(), 3);
}

#[test]
fn test_privilege_in_storm_order_over_steps() {
    const STEPS: usize = 10;
    let storms = [2, 4, 6];
    let mut ctx = context(6, &storms);
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for _ in 0..STEPS {
        for (index, &raw) in storms.iter().enumerate() {
            let gate = ctx.privilege();
            let barrier = ctx.barrier();
            let order = Arc::clone(&order);
            let next = storms.get(index + 1).map_or(DomainId::PARENT, |&n| d(n));
            ctx.launch_domain(d(raw), move |domain| {
                barrier.arrive();
                gate.await_privilege(domain).unwrap();
                order.lock().push(domain.get());
                gate.grant_privilege(next).unwrap();
            })
            .unwrap();
        }

        ctx.grant_privilege(d(storms[0])).unwrap();
        ctx.await_privilege(DomainId::PARENT).unwrap();
        assert!(ctx.wait_all_domains().is_clean());
    }

    let order = order.lock();
    assert_eq!(order.len(), STEPS * storms.len());
    for chunk in order.chunks(storms.len()) {
        assert_eq!(chunk, &storms);
    }
}

#[test]
fn test_out_of_range_launch_does_not_activate_slot() {
    let mut ctx = context(2, &[]);
    let result = ctx.launch_domain(d(9), |_| {});
    assert!(matches!(result, Err(SpawnError::Registry(_))));
    assert_eq!(ctx.registry().active_count(), 0);
}

#[test]
fn test_refused_spawn_does_not_activate_slot() {
    // No OS can reserve a 4 EiB stack.
    let settings = IntegrationSettings::new(2)
        .with_attributes(ThreadAttributes::with_stack_size(1 << 62).unwrap());
    let mut ctx = IntegrationContext::initialize(settings).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let result = ctx.launch_domain(d(1), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    match result {
        Err(SpawnError::SpawnFailed { domain, source }) => {
            assert_eq!(domain, d(1));
            assert!(source.raw_os_error().is_some());
        }
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
    assert!(!ctx.registry().slot(d(1)).unwrap().is_active());
    assert_eq!(ctx.registry().active_count(), 0);
    assert!(ctx.wait_all_domains().is_empty());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
