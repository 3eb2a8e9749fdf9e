use remutex::test_utils::{init_tracing, MemoryStore};
use remutex::{Error, Gate, Mutex, MutexConfig, Outcome, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LIFETIME: Duration = Duration::from_secs(10);

fn memory_mutex() -> (Mutex, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mutex = Mutex::with_store(
        Arc::clone(&store) as Arc<dyn Store>,
        &MutexConfig::default(),
    );
    (mutex, store)
}

#[tokio::test]
async fn isolate_runs_work_then_frees_the_key() {
    let (mutex, store) = memory_mutex();

    let outcome = mutex
        .isolate("foo", LIFETIME, || async { "payload" })
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done("payload"));

    // Released: the key is gone and a second round succeeds immediately.
    assert_eq!(store.key_count(), 0);
    let outcome = mutex
        .isolate("foo", LIFETIME, || async { "again" })
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done("again"));
}

#[tokio::test]
async fn isolate_reports_busy_without_running_work() {
    let (mutex, _store) = memory_mutex();
    let ran = Arc::new(AtomicUsize::new(0));

    mutex.lock("foo", LIFETIME).await.unwrap();

    let ran_in_work = Arc::clone(&ran);
    let outcome = mutex
        .isolate("foo", LIFETIME, move || async move {
            ran_in_work.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert!(outcome.is_busy());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn isolate_retry_completes_once_the_holder_frees() {
    let (mutex, _store) = memory_mutex();

    mutex.lock("foo", LIFETIME).await.unwrap();

    let contender = {
        let mutex = mutex.clone();
        tokio::spawn(async move {
            mutex
                .isolate_retry("foo", LIFETIME, || async { "from contender" })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    mutex.free("foo").await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), contender)
        .await
        .expect("contender must not sleep out the full lease")
        .unwrap()
        .unwrap();
    assert_eq!(result, "from contender");
}

#[tokio::test]
async fn short_circuit_never_touches_the_lease() {
    let (mutex, store) = memory_mutex();
    let ran = Arc::new(AtomicUsize::new(0));

    let ran_in_work = Arc::clone(&ran);
    let outcome = mutex
        .isolate_cond(
            "foo",
            LIFETIME,
            || async { Ok(Gate::ShortCircuit(42)) },
            move || async move {
                ran_in_work.fetch_add(1, Ordering::SeqCst);
                0
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Done(42));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(store.key_count(), 0, "no lease key may be written");
}

#[tokio::test]
async fn proceed_runs_the_work_under_the_lease() {
    let (mutex, _store) = memory_mutex();

    let outcome = mutex
        .isolate_cond(
            "foo",
            LIFETIME,
            || async { Ok(Gate::Proceed) },
            || async { 7 },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done(7));
}

#[tokio::test]
async fn cond_retry_invokes_check_exactly_once_under_contention() {
    let (mutex, _store) = memory_mutex();
    let checks = Arc::new(AtomicUsize::new(0));

    mutex.lock("foo", LIFETIME).await.unwrap();

    let contender = {
        let mutex = mutex.clone();
        let checks = Arc::clone(&checks);
        tokio::spawn(async move {
            mutex
                .isolate_cond_retry(
                    "foo",
                    LIFETIME,
                    move || async move {
                        checks.fetch_add(1, Ordering::SeqCst);
                        Ok(Gate::Proceed)
                    },
                    || async { "ran" },
                )
                .await
        })
    };

    // Let the contender lose the first attempt and start waiting, then free.
    tokio::time::sleep(Duration::from_millis(100)).await;
    mutex.free("foo").await.unwrap();

    let result = contender.await.unwrap().unwrap();
    assert_eq!(result, "ran");
    assert_eq!(
        checks.load(Ordering::SeqCst),
        1,
        "contention must retry the lock only, not the check"
    );
}

#[tokio::test]
async fn check_errors_abort_before_the_lock() {
    let (mutex, store) = memory_mutex();
    let ran = Arc::new(AtomicUsize::new(0));

    let ran_in_work = Arc::clone(&ran);
    let result: remutex::Result<Outcome<()>> = mutex
        .isolate_cond(
            "foo",
            LIFETIME,
            || async { Err(anyhow::anyhow!("check blew up").into()) },
            move || async move {
                ran_in_work.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

    assert!(matches!(result, Err(Error::Other(_))));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(store.key_count(), 0);
}

#[tokio::test]
async fn store_outage_during_acquire_surfaces_and_skips_work() {
    let (mutex, store) = memory_mutex();
    let ran = Arc::new(AtomicUsize::new(0));

    store.set_offline(true);
    let ran_in_work = Arc::clone(&ran);
    let result = mutex
        .isolate("foo", LIFETIME, move || async move {
            ran_in_work.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert!(matches!(result, Err(Error::Store(_))));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn release_failure_does_not_shadow_the_work_result() {
    let (mutex, store) = memory_mutex();

    let store_in_work = Arc::clone(&store);
    let outcome = mutex
        .isolate("foo", LIFETIME, move || async move {
            // The store goes away while we hold the lease.
            store_in_work.set_offline(true);
            "still delivered"
        })
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Done("still delivered"));
    // The release failed, so the lease is stuck until it expires.
    store.set_offline(false);
    assert_eq!(store.key_count(), 1);
}
