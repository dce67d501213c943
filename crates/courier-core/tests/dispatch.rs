//! End-to-end dispatch properties across destinations, routing and locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use courier_core::prelude::*;

fn request(address: &str, protocol: &str) -> Request {
    Request::new(address, protocol, Sink::text("payload"))
}

fn tagged(tag: &'static str) -> ConcurrentDestination {
    ConcurrentDestination::new(Handler::auto_locked(move |_| async move {
        Response::ok(Sink::text(tag))
    }))
}

/// Handler that records whether two invocations ever overlap.
fn overlap_tracker(active: Arc<AtomicUsize>, overlapped: Arc<AtomicBool>) -> Handler {
    Handler::auto_locked(move |_| {
        let active = Arc::clone(&active);
        let overlapped = Arc::clone(&overlapped);
        async move {
            if active.fetch_add(1, Ordering::SeqCst) != 0 {
                overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Response::empty()
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locked_destination_never_overlaps() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));

    let book = RouteAddressBook::new().with(
        "/counter",
        LockedDestination::new(overlap_tracker(Arc::clone(&active), Arc::clone(&overlapped))),
    );
    let dispatcher = Arc::new(Dispatcher::new(book));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .call(&ExecutionContext::new(), request("/counter", "/inc"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert!(!overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn canceled_waiter_never_runs_locked_body() {
    let ran = Arc::new(AtomicUsize::new(0));
    let lock = CancellableLock::new();
    let holder = ExecutionContext::new();
    assert!(holder.acquire_or_cancel(&lock).await);

    let handler = {
        let ran = Arc::clone(&ran);
        Handler::auto_locked(move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            async { Response::empty() }
        })
    };

    let (ctx, canceller) = ExecutionContext::with_cancel();
    let waiter = {
        let handler = handler.clone();
        let lock = lock.clone();
        tokio::spawn(async move { handler.serve(&ctx, &lock, request("/", "/p")).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    canceller.cancel();

    let response = waiter.await.unwrap();
    assert_eq!(response.err(), Some(&DispatchError::ContextCanceled));
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    holder.release();
    assert!(lock.is_free());
}

#[tokio::test]
async fn cancel_after_acquire_does_not_interrupt() {
    let (ctx, canceller) = ExecutionContext::with_cancel();
    let canceller = Arc::new(parking_lot::Mutex::new(Some(canceller)));

    let handler = {
        let canceller = Arc::clone(&canceller);
        Handler::auto_locked(move |_| {
            let canceller = canceller.lock().take();
            async move {
                if let Some(canceller) = canceller {
                    canceller.cancel();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                Response::ok(Sink::text("finished"))
            }
        })
    };

    let dest = LockedDestination::new(handler);
    let response = dest.call(&ctx, request("/", "/p")).await;

    assert!(ctx.is_cancelled());
    assert_eq!(response.body().unwrap().as_str(), Some("finished"));
    assert!(dest.lock().is_free());
}

#[tokio::test]
async fn panic_is_contained_and_lock_reusable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mux = MuxDestination::new();
    {
        let calls = Arc::clone(&calls);
        mux.handle_locked("/flaky", move |_| {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    panic!("first call fails");
                }
                Response::ok(Sink::text("recovered"))
            }
        });
    }
    let dispatcher = Dispatcher::new(RouteAddressBook::new().with("/svc", mux));
    let ctx = ExecutionContext::new();

    let failed = dispatcher.call(&ctx, request("/svc", "/flaky")).await;
    match failed.err() {
        Some(DispatchError::Panic { detail, .. }) => assert_eq!(detail, "first call fails"),
        other => panic!("expected a contained panic, got {other:?}"),
    }

    let ok = dispatcher.call(&ctx, request("/svc", "/flaky")).await;
    assert_eq!(ok.body().unwrap().as_str(), Some("recovered"));
    assert_eq!(ctx.held_count(), 0);
}

#[tokio::test]
async fn longest_prefix_routing_precedence() {
    let dispatcher = Dispatcher::new(
        RouteAddressBook::new()
            .with("/a/", tagged("a"))
            .with("/a/b/", tagged("ab")),
    );
    let ctx = ExecutionContext::new();

    let deep = dispatcher.call(&ctx, request("/a/b/c", "/")).await;
    let shallow = dispatcher.call(&ctx, request("/a/x", "/")).await;

    assert_eq!(deep.body().unwrap().as_str(), Some("ab"));
    assert_eq!(shallow.body().unwrap().as_str(), Some("a"));
}

#[tokio::test]
async fn dispatcher_miss_reports_address() {
    let dispatcher = Dispatcher::new(RouteAddressBook::new().with("/known", tagged("k")));

    let response = dispatcher
        .call(&ExecutionContext::new(), request("/unknown", "/"))
        .await;
    assert_eq!(
        response.err(),
        Some(&DispatchError::DestNotFound("/unknown".into()))
    );
    assert_eq!(
        dispatcher.send(request("/unknown", "/")),
        Err(DispatchError::DestNotFound("/unknown".into()))
    );
}

#[tokio::test]
async fn send_through_dispatcher_reaches_handler() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mux = MuxDestination::new();
    mux.handle_locked("/notify", move |request: Request| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(request.body().to_string());
            Response::empty()
        }
    });
    let dispatcher = Dispatcher::new(RouteAddressBook::new().with("/inbox", mux));

    dispatcher.send(request("/inbox", "/notify")).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap();
    assert_eq!(received.as_deref(), Some("payload"));
}
