mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use common::{FakeSpawner, id, until_exit, until_exit_events, wait_for};
use procvisor::{Cluster, ClusterConfig, EventKind, ProcessRole};

fn pool(workers: usize, auto_spawn: bool) -> ClusterConfig {
    ClusterConfig {
        auto_spawn,
        ..ClusterConfig::with_workers(workers)
    }
}

#[tokio::test]
async fn standalone_is_ready_once_and_not_a_cluster() {
    let cluster = Cluster::builder(ClusterConfig::default())
        .as_primary()
        .without_signals()
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();

    assert_eq!(handle.role(), ProcessRole::Standalone);
    assert!(!handle.is_cluster());
    assert!(!handle.is_master());
    assert_eq!(handle.id(), None);

    let run = tokio::spawn(cluster.run());
    handle.stop().unwrap();

    let events = until_exit_events(&mut rx).await;
    assert!(matches!(events[0].kind, EventKind::StandaloneReady { .. }));
    assert_eq!(events.iter().filter(|e| e.is_ready()).count(), 1);
    assert!(run.await.unwrap().success());
    assert!(handle.workers().is_empty());
}

#[tokio::test]
async fn master_spawns_the_requested_pool() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(3, false))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    assert!(handle.is_master());
    assert!(handle.is_cluster());

    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    let workers = handle.workers();
    assert_eq!(workers.len(), 3);
    let pids: BTreeSet<u32> = workers.values().map(|w| w.pid).collect();
    assert_eq!(pids.len(), 3);
    assert_eq!(
        workers.keys().copied().collect::<Vec<_>>(),
        vec![id(1), id(2), id(3)]
    );

    let pid = workers[&id(2)].pid;
    assert_eq!(handle.worker_pid_by_id(id(2)), Some(pid));
    assert_eq!(handle.worker_id_by_pid(pid), Some(id(2)));
    assert_eq!(handle.worker_pid_by_id(id(9)), None);
    assert_eq!(handle.worker_id_by_pid(1), None);

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    let exits: Vec<bool> = kinds
        .iter()
        .filter_map(|k| match k {
            EventKind::WorkerExited { intentional, .. } => Some(*intentional),
            _ => None,
        })
        .collect();
    assert_eq!(exits, vec![true, true, true]);
    assert_eq!(run.await.unwrap().code, 0);
}

#[tokio::test]
async fn single_worker_master_spawns_nothing() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(1, true))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());

    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;
    assert!(handle.is_master());
    assert!(handle.workers().is_empty());

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    assert!(!kinds
        .iter()
        .any(|k| matches!(k, EventKind::WorkerSpawned { .. })));
    assert_eq!(run.await.unwrap().code, 0);
}

#[tokio::test(start_paused = true)]
async fn long_lived_crash_is_replaced() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(4, true))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;
    let old_pid = handle.worker_pid_by_id(id(2)).unwrap();

    tokio::time::advance(Duration::from_secs(15)).await;
    spawner.crash(id(2));

    let exited = wait_for(&mut rx, |k| matches!(k, EventKind::WorkerExited { .. })).await;
    assert_eq!(
        exited.kind,
        EventKind::WorkerExited {
            id: id(2),
            pid: old_pid,
            code: Some(1),
            signal: None,
            intentional: false,
        }
    );
    let respawned = wait_for(&mut rx, |k| matches!(k, EventKind::AutoSpawn { .. })).await;
    let EventKind::AutoSpawn { id: new_id, pid } = respawned.kind else {
        unreachable!()
    };
    assert_eq!(new_id, id(5));
    assert_ne!(pid, old_pid);
    assert_eq!(handle.workers().len(), 4);

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    assert!(!kinds.iter().any(|k| matches!(
        k,
        EventKind::AutoSpawn { .. } | EventKind::CapacityReduced { .. }
    )));
    assert_eq!(run.await.unwrap().code, 0);
}

#[tokio::test(start_paused = true)]
async fn early_crash_shrinks_the_pool_for_good() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(4, true))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    tokio::time::advance(Duration::from_secs(3)).await;
    spawner.crash(id(1));

    let reduced = wait_for(&mut rx, |k| {
        matches!(
            k,
            EventKind::CapacityReduced { .. } | EventKind::AutoSpawn { .. }
        )
    })
    .await;
    assert_eq!(
        reduced.kind,
        EventKind::CapacityReduced {
            id: id(1),
            desired: 3
        }
    );
    assert_eq!(handle.workers().len(), 3);

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::AutoSpawn { .. })));
    assert_eq!(run.await.unwrap().code, 0);
}

#[tokio::test]
async fn crash_without_auto_spawn_is_not_replaced() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(3, false))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    spawner.crash(id(3));
    wait_for(&mut rx, |k| matches!(k, EventKind::WorkerExited { .. })).await;
    let synced = wait_for(&mut rx, |k| matches!(k, EventKind::Sync { .. })).await;
    let EventKind::Sync { workers } = synced.kind else {
        unreachable!()
    };
    assert_eq!(workers.keys().copied().collect::<Vec<_>>(), vec![id(1), id(2)]);
    assert_eq!(handle.workers().len(), 2);

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    assert!(!kinds.iter().any(|k| matches!(
        k,
        EventKind::AutoSpawn { .. } | EventKind::WorkerSpawned { .. }
    )));
    assert_eq!(run.await.unwrap().code, 0);
}

#[tokio::test]
async fn losing_every_worker_to_crashes_is_fatal() {
    let spawner = FakeSpawner::new();
    let cluster = Cluster::builder(pool(2, true))
        .as_primary()
        .without_signals()
        .with_spawner(spawner.clone())
        .build()
        .unwrap();
    let handle = cluster.handle();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(cluster.run());
    wait_for(&mut rx, |k| matches!(k, EventKind::MasterReady { .. })).await;

    spawner.crash(id(1));
    spawner.crash(id(2));

    let kinds = until_exit(&mut rx).await;
    let reduced = kinds
        .iter()
        .filter(|k| matches!(k, EventKind::CapacityReduced { .. }))
        .count();
    assert_eq!(reduced, 2);
    assert!(kinds.contains(&EventKind::ShutdownRequested {
        signal: None,
        fatal: true
    }));
    assert_eq!(kinds.last(), Some(&EventKind::Exit { code: 1, signal: None }));
    assert_eq!(run.await.unwrap().code, 1);
}

#[tokio::test]
async fn disabled_sync_keeps_the_map_private() {
    let spawner = FakeSpawner::new();
    let cfg = ClusterConfig {
        sync: false,
        ..pool(2, false)
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

    assert!(handle.workers().is_empty());
    assert_eq!(handle.worker_pid_by_id(id(1)), None);

    handle.stop().unwrap();
    let kinds = until_exit(&mut rx).await;
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::Sync { .. })));
    run.await.unwrap();
    assert_eq!(
        spawner.count(|c| matches!(c, procvisor::Command::Sync { .. })),
        0
    );
}
