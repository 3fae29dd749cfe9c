mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeSpawner, id, until_exit, wait_for};
use procvisor::{
    Cluster, ClusterConfig, Command, Envelope, EventKind, Peer, RemoteError, ShutdownTask,
    TaskError,
};

fn standalone() -> Cluster {
    Cluster::builder(ClusterConfig::default())
        .as_primary()
        .without_signals()
        .build()
        .unwrap()
}

#[tokio::test]
async fn clean_stop_runs_the_task_and_exits_zero() {
    let cluster = standalone();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    handle
        .add_shutdown_task(ShutdownTask::new("noop", |done| done.ok()))
        .unwrap();

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();

    let kinds = until_exit(&mut rx).await;
    assert_eq!(kinds.last(), Some(&EventKind::Exit { code: 0, signal: None }));
    let exit = run.await.unwrap();
    assert_eq!(exit.code, 0);
    assert_eq!(exit.signal, None);
}

#[tokio::test]
async fn tasks_run_strictly_in_registration_order() {
    let cluster = standalone();
    let handle = cluster.handle();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&log);
    handle
        .add_shutdown_task(ShutdownTask::new("slow", move |done| {
            first.lock().unwrap().push("slow:start");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                first.lock().unwrap().push("slow:done");
                done.ok();
            });
        }))
        .unwrap();
    let second = Arc::clone(&log);
    handle
        .add_shutdown_task(ShutdownTask::future("fast", async move {
            second.lock().unwrap().push("fast:start");
            Ok(())
        }))
        .unwrap();

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();
    assert!(run.await.unwrap().success());

    assert_eq!(
        *log.lock().unwrap(),
        vec!["slow:start", "slow:done", "fast:start"]
    );
}

#[tokio::test]
async fn overlapping_stops_finish_once() {
    let cluster = standalone();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    handle
        .add_shutdown_task(ShutdownTask::new("count", move |done| {
            counter.fetch_add(1, Ordering::SeqCst);
            done.ok();
        }))
        .unwrap();

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();
    let _ = handle.stop();
    let exit = run.await.unwrap();

    assert_eq!(exit.code, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let mut exits = 0;
    while let Ok(event) = rx.try_recv() {
        if event.is_exit() {
            exits += 1;
        }
    }
    assert_eq!(exits, 1);
    assert!(handle.stop().is_err());
}

#[tokio::test]
async fn failed_task_sets_code_one_but_later_tasks_run() {
    let cluster = standalone();
    let handle = cluster.handle();
    let ran = Arc::new(AtomicUsize::new(0));

    handle
        .add_shutdown_task(ShutdownTask::new("fails", |done| done.fail("disk full")))
        .unwrap();
    handle
        .add_shutdown_task(ShutdownTask::new("drops", |done| drop(done)))
        .unwrap();
    let counter = Arc::clone(&ran);
    handle
        .add_shutdown_task(ShutdownTask::future("after", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TaskError>(())
        }))
        .unwrap();

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();

    assert_eq!(run.await.unwrap().code, 1);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_with_error_is_fatal() {
    let cluster = standalone();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());

    let io = std::io::Error::other("database unreachable");
    handle.stop_with_error(RemoteError::from_error(&io)).unwrap();

    let kinds = until_exit(&mut rx).await;
    assert!(kinds.contains(&EventKind::ShutdownRequested {
        signal: None,
        fatal: true
    }));
    assert_eq!(kinds.last(), Some(&EventKind::Exit { code: 1, signal: None }));
    assert_eq!(run.await.unwrap().code, 1);
}

#[tokio::test]
async fn exit_hook_runs_after_the_exit_event() {
    let cluster = standalone();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let log = Arc::new(Mutex::new(Vec::new()));

    let task_log = Arc::clone(&log);
    handle
        .add_shutdown_task(ShutdownTask::new("task", move |done| {
            task_log.lock().unwrap().push("task");
            done.ok();
        }))
        .unwrap();
    handle.on_exit(|_done| panic!("replaced hook must not run")).unwrap();
    let hook_log = Arc::clone(&log);
    handle
        .on_exit(move |done| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                hook_log.lock().unwrap().push("hook");
                done.ok();
            });
        })
        .unwrap();

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();
    wait_for(&mut rx, |k| matches!(k, EventKind::Exit { .. })).await;
    let exit = run.await.unwrap();

    assert_eq!(exit.code, 0);
    assert_eq!(*log.lock().unwrap(), vec!["task", "hook"]);
}

#[tokio::test]
async fn pooled_master_runs_only_master_tasks() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(ClusterConfig::with_workers(2))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let log = Arc::new(Mutex::new(Vec::new()));
    for (name, on_master) in [("both", true), ("workers-only", false)] {
        let log = Arc::clone(&log);
        handle
            .add_shutdown_task(
                ShutdownTask::new(name, move |done| {
                    log.lock().unwrap().push(name);
                    done.ok();
                })
                .master_only(on_master),
            )
            .unwrap();
    }

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();
    assert!(run.await.unwrap().success());

    assert_eq!(*log.lock().unwrap(), vec!["both"]);
    assert_eq!(
        spawner.count(|c| matches!(c, Command::Exit { error: None })),
        2
    );
}

#[tokio::test]
async fn single_process_master_runs_every_task() {
    let cluster = Cluster::builder(ClusterConfig::with_workers(1))
        .as_primary()
        .without_signals()
        .build()
        .unwrap();
    let handle = cluster.handle();
    let ran = Arc::new(AtomicUsize::new(0));
    for on_master in [true, false] {
        let ran = Arc::clone(&ran);
        handle
            .add_shutdown_task(
                ShutdownTask::new("task", move |done| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    done.ok();
                })
                .master_only(on_master),
            )
            .unwrap();
    }

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();
    assert!(run.await.unwrap().success());
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn worker_exit_request_shuts_the_pool_down() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(ClusterConfig::with_workers(2))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    let request = Envelope::new(
        Peer::Worker(id(1)),
        None,
        Command::Exit {
            error: Some(RemoteError::new("config invalid")),
        },
    );
    spawner.emit_envelope(id(1), &request);

    let kinds = until_exit(&mut rx).await;
    assert!(kinds.contains(&EventKind::ShutdownRequested {
        signal: None,
        fatal: true
    }));
    let drained = kinds
        .iter()
        .filter(|k| matches!(k, EventKind::WorkerExited { intentional: true, .. }))
        .count();
    assert_eq!(drained, 2);
    assert_eq!(run.await.unwrap().code, 1);
    assert_eq!(spawner.received_by(id(2)).last(), Some(&Command::Exit { error: None }));
}

#[tokio::test(start_paused = true)]
async fn stragglers_are_killed_after_grace() {
    let spawner = FakeSpawner::stubborn();
    let cfg = ClusterConfig {
        grace: Duration::from_secs(2),
        ..ClusterConfig::with_workers(2)
    };
    let cluster = Cluster::builder(cfg)
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;

    assert!(kinds.contains(&EventKind::GraceExceeded {
        stuck: vec![id(1), id(2)]
    }));
    let killed = kinds
        .iter()
        .filter(|k| {
            matches!(
                k,
                EventKind::WorkerExited {
                    signal: Some(9),
                    intentional: true,
                    ..
                }
            )
        })
        .count();
    assert_eq!(killed, 2);
    assert_eq!(run.await.unwrap().code, 0);
}
