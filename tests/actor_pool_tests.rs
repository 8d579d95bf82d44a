//! Integration tests for the actor pool: dispatch fairness, membership
//! control messages, failure handling, and exit forwarding.

use std::sync::Arc;

use perch::{
    ActorHandle, ActorPool, ActorSystem, DispatchPolicy, DownMsg, Envelope, ExitMsg, ExitReason,
    InboxActor, Message, SysMsg,
};

/// Creates a quiet actor system for testing.
fn test_system() -> ActorSystem {
    perch::logging::init_test();
    ActorSystem::default()
}

fn passive_workers(system: &ActorSystem, n: usize) -> (Vec<Arc<InboxActor>>, Vec<ActorHandle>) {
    let actors: Vec<_> = (0..n).map(|_| InboxActor::new(system)).collect();
    let handles = actors.iter().map(|a| a.handle()).collect();
    (actors, handles)
}

fn pool_over(system: &ActorSystem, handles: &[ActorHandle], policy: DispatchPolicy) -> ActorHandle {
    let mut remaining = handles.to_vec().into_iter();
    ActorPool::with_workers(
        system,
        handles.len(),
        move || remaining.next().expect("factory called too often"),
        policy,
    )
}

/// Sends `(sys, get)` and returns the worker snapshot from the response.
fn query_workers(pool: &ActorHandle, client: &Arc<InboxActor>) -> Vec<ActorHandle> {
    let request = Envelope::request(client.handle(), Message::new(SysMsg::Get));
    let mid = request.mid;
    assert!(pool.enqueue(request, None));
    let responses = client.take_messages();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].mid, mid.response_id());
    responses[0]
        .payload
        .view::<Vec<ActorHandle>>()
        .expect("worker vector response")
        .clone()
}

#[test]
fn round_robin_distributes_evenly() {
    let system = test_system();
    let (actors, handles) = passive_workers(&system, 3);
    let pool = pool_over(&system, &handles, DispatchPolicy::round_robin());

    for i in 0..12u32 {
        assert!(pool.enqueue(Envelope::anonymous(Message::new(i)), None));
    }

    for (w, actor) in actors.iter().enumerate() {
        let values: Vec<u32> = actor
            .take_messages()
            .iter()
            .map(|env| *env.payload.view::<u32>().unwrap())
            .collect();
        // Worker w receives every third message, in send order.
        let expected: Vec<u32> = (0..4).map(|round| w as u32 + round * 3).collect();
        assert_eq!(values, expected);
    }
}

#[test]
fn broadcast_reaches_every_worker_with_sender_and_mid() {
    let system = test_system();
    let (actors, handles) = passive_workers(&system, 3);
    let pool = pool_over(&system, &handles, DispatchPolicy::broadcast());
    let client = InboxActor::new(&system);

    for i in 0..5u32 {
        assert!(pool.enqueue(Envelope::anonymous(Message::new(i)), None));
    }
    let request = Envelope::request(client.handle(), Message::new(99u32));
    let request_mid = request.mid;
    assert!(pool.enqueue(request, None));

    for actor in &actors {
        let batch = actor.take_messages();
        assert_eq!(batch.len(), 6);
        let values: Vec<u32> = batch
            .iter()
            .map(|env| *env.payload.view::<u32>().unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 99]);
        // The copy keeps the original sender and message id.
        assert_eq!(batch[5].mid, request_mid);
        assert_eq!(batch[5].sender.as_ref().map(|s| s.id()), Some(client.id()));
    }
}

#[test]
fn random_preserves_every_message() {
    let system = test_system();
    let (actors, handles) = passive_workers(&system, 4);
    let pool = pool_over(&system, &handles, DispatchPolicy::random());

    for i in 0..40u32 {
        assert!(pool.enqueue(Envelope::anonymous(Message::new(i)), None));
    }

    let mut seen: Vec<u32> = Vec::new();
    for actor in &actors {
        seen.extend(
            actor
                .take_messages()
                .iter()
                .map(|env| *env.payload.view::<u32>().unwrap()),
        );
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..40).collect::<Vec<u32>>());
}

#[test]
fn membership_follows_put_delete_and_clear() {
    let system = test_system();
    let (_actors, handles) = passive_workers(&system, 2);
    let pool = ActorPool::make(&system, DispatchPolicy::round_robin());
    let client = InboxActor::new(&system);

    assert!(query_workers(&pool, &client).is_empty());

    pool.enqueue(
        Envelope::anonymous(Message::new(SysMsg::Put(handles[0].clone()))),
        None,
    );
    pool.enqueue(
        Envelope::anonymous(Message::new(SysMsg::Put(handles[1].clone()))),
        None,
    );
    let current = query_workers(&pool, &client);
    assert_eq!(current.len(), 2);
    assert!(current.contains(&handles[0]));
    assert!(current.contains(&handles[1]));

    pool.enqueue(
        Envelope::anonymous(Message::new(SysMsg::Delete(handles[0].clone()))),
        None,
    );
    let current = query_workers(&pool, &client);
    assert_eq!(current, vec![handles[1].clone()]);

    pool.enqueue(Envelope::anonymous(Message::new(SysMsg::Clear)), None);
    assert!(query_workers(&pool, &client).is_empty());
}

#[test]
fn deleting_an_absent_worker_is_not_an_error() {
    let system = test_system();
    let (_actors, handles) = passive_workers(&system, 2);
    let pool = pool_over(&system, &handles[..1], DispatchPolicy::round_robin());
    let client = InboxActor::new(&system);

    pool.enqueue(
        Envelope::anonymous(Message::new(SysMsg::Delete(handles[1].clone()))),
        None,
    );
    assert_eq!(query_workers(&pool, &client), vec![handles[0].clone()]);
}

#[test]
fn request_to_empty_pool_gets_an_empty_response() {
    let system = test_system();
    let pool = ActorPool::make(&system, DispatchPolicy::round_robin());
    let client = InboxActor::new(&system);

    let request = Envelope::request(client.handle(), Message::new(42u32));
    let mid = request.mid;
    assert!(pool.enqueue(request, None));

    let responses = client.take_messages();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].mid, mid.response_id());
    assert!(responses[0].payload.is_empty());
}

#[test]
fn fire_and_forget_to_empty_pool_is_dropped_silently() {
    let system = test_system();
    let pool = ActorPool::make(&system, DispatchPolicy::round_robin());
    let client = InboxActor::new(&system);

    assert!(pool.enqueue(
        Envelope::new(Some(client.handle()), perch::MessageId::Async, Message::new(1u32)),
        None,
    ));
    assert!(client.take_messages().is_empty());
}

#[test]
fn crashed_workers_disappear_and_the_last_one_ends_the_pool() {
    let system = test_system();
    let (actors, handles) = passive_workers(&system, 2);
    let pool = pool_over(&system, &handles, DispatchPolicy::round_robin());
    let client = InboxActor::new(&system);
    let observer = InboxActor::new(&system);
    pool.attach_monitor(observer.handle().downgrade());

    actors[0].terminate(ExitReason::Kill);
    let current = query_workers(&pool, &client);
    assert_eq!(current, vec![handles[1].clone()]);
    assert!(observer.take_messages().is_empty());

    actors[1].terminate(ExitReason::Kill);
    assert!(query_workers(&pool, &client).is_empty());

    let down = observer.take_messages();
    assert_eq!(down.len(), 1);
    let down = down[0].payload.view::<DownMsg>().expect("down message");
    assert_eq!(down.source, pool.id());
    assert_eq!(down.reason, ExitReason::OutOfWorkers);
}

#[test]
fn exit_is_forwarded_to_every_worker() {
    let system = test_system();
    let (actors, handles) = passive_workers(&system, 3);
    let pool = pool_over(&system, &handles, DispatchPolicy::broadcast());
    let client = InboxActor::new(&system);

    assert_eq!(system.running_actors(), 5); // 3 workers + pool + client
    pool.enqueue(
        Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::UserShutdown))),
        None,
    );

    for actor in &actors {
        let batch = actor.take_messages();
        assert_eq!(batch.len(), 1);
        let exit = batch[0].payload.view::<ExitMsg>().expect("exit message");
        assert_eq!(exit.reason, ExitReason::UserShutdown);
    }

    // Repeated exits after the first cleanup are absorbed.
    pool.enqueue(
        Envelope::anonymous(Message::new(ExitMsg::new(ExitReason::Normal))),
        None,
    );
    for actor in &actors {
        assert!(actor.take_messages().is_empty());
    }

    // The pool is drained of workers and keeps answering requests empty.
    assert!(query_workers(&pool, &client).is_empty());
}
