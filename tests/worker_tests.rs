//! Integration tests for spawned workers: the dedicated-thread consumer
//! loop, exit handling, request bouncing, and pools of live workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use perch::{
    ActorPool, ActorSystem, DispatchPolicy, Envelope, ExitMsg, ExitReason, InboxActor, Message,
};

/// Creates a quiet actor system for testing.
fn test_system() -> ActorSystem {
    perch::logging::init_test();
    ActorSystem::default()
}

/// Polls `cond` until it holds or the deadline passes.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn spawned_worker_processes_messages_in_send_order() {
    let system = test_system();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let worker = system
        .spawn(move |_host, envelope| {
            if let Some(n) = envelope.payload.view::<u32>() {
                sink.lock().unwrap().push(*n);
            }
        })
        .expect("spawn worker");

    for i in 0..32u32 {
        assert!(worker.enqueue(Envelope::anonymous(Message::new(i)), None));
    }
    assert!(wait_until(Duration::from_secs(5), || {
        seen.lock().unwrap().len() == 32
    }));
    assert_eq!(*seen.lock().unwrap(), (0..32).collect::<Vec<u32>>());

    assert!(worker.enqueue(
        Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::Normal))),
        None
    ));
    system
        .await_all_actors_done_timeout(Duration::from_secs(5))
        .expect("worker terminates");
}

#[test]
fn exit_terminates_the_worker_and_later_requests_bounce() {
    let system = test_system();
    let worker = system.spawn(|_host, _envelope| {}).expect("spawn worker");
    let client = InboxActor::new(&system);

    worker.enqueue(
        Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::Normal))),
        None,
    );
    assert!(wait_until(Duration::from_secs(5), || {
        system.running_actors() == 1 // only the passive client remains
    }));

    let request = Envelope::request(client.handle(), Message::new(7u32));
    let mid = request.mid;
    assert!(!worker.enqueue(request, None));

    let responses = client.take_messages();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].mid, mid.response_id());
    assert!(responses[0].payload.is_empty());
}

#[test]
fn pool_of_spawned_workers_shares_the_load() {
    let system = test_system();
    let counters: Vec<Arc<AtomicUsize>> = (0..2).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let handles: Vec<_> = counters
        .iter()
        .map(|counter| {
            let counter = Arc::clone(counter);
            system
                .spawn(move |_host, _envelope| {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .expect("spawn worker")
        })
        .collect();
    let mut remaining = handles.into_iter();
    let pool = ActorPool::with_workers(
        &system,
        2,
        move || remaining.next().expect("one handle per worker"),
        DispatchPolicy::round_robin(),
    );

    for i in 0..10u32 {
        assert!(pool.enqueue(Envelope::anonymous(Message::new(i)), None));
    }
    assert!(wait_until(Duration::from_secs(5), || {
        counters.iter().map(|c| c.load(Ordering::Relaxed)).sum::<usize>() == 10
    }));
    for counter in &counters {
        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    // Tearing the pool down forwards the exit to both live workers.
    pool.enqueue(
        Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::Normal))),
        None,
    );
    system
        .await_all_actors_done_timeout(Duration::from_secs(5))
        .expect("workers and pool terminate");
}

#[test]
fn timed_await_on_a_quiet_worker_expires() {
    let system = test_system();
    let actor = InboxActor::new(&system);
    let deadline = Instant::now() + Duration::from_millis(10);
    assert!(!actor.await_message(Some(deadline)));

    actor
        .handle()
        .enqueue(Envelope::anonymous(Message::new(1u32)), None);
    assert!(actor.await_message(Some(deadline)));
    assert_eq!(actor.take_messages().len(), 1);
}
