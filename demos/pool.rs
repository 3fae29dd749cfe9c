//! # Example: pool
//!
//! One binary, three roles. Started without `PROCVISOR_WORKER_ID` it becomes the master
//! and re-executes itself once per worker; the children pick up the worker role from the
//! environment and talk to the master over their stdio.
//!
//! ```text
//! master ──spawn──► worker 1 ─┐
//!        ──spawn──► worker 2 ─┼─ stdout/stdin JSON frames
//!        ──spawn──► worker 3 ─┘
//! ```
//!
//! - `SIGHUP` to the master → rolling reload, one worker at a time
//! - `SIGINT` / `SIGTERM` → coordinated shutdown, EXIT to every worker
//!
//! Logs go to stderr: a worker's stdout is its channel to the master.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example pool
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::{
    Cluster, ClusterConfig, EventKind, LogWriter, ShutdownTask, Subscribe, TaskError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cfg = ClusterConfig {
        workers: 3,
        auto_spawn: true,
        grace: Duration::from_secs(5),
        ..ClusterConfig::default()
    };
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let cluster = match Cluster::builder(cfg).with_subscribers(subscribers).build() {
        Ok(cluster) => cluster,
        Err(err) => {
            eprintln!("cannot start cluster: {err}");
            std::process::exit(1);
        }
    };

    let handle = cluster.handle();
    handle
        .add_shutdown_task(
            ShutdownTask::future("flush", async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, TaskError>(())
            })
            .master_only(false),
        )
        .expect("cluster not running yet");

    if !handle.is_master() {
        let worker = handle.clone();
        tokio::spawn(async move {
            let mut events = worker.subscribe();
            while let Ok(event) = events.recv().await {
                if let EventKind::Message { from, payload } = event.kind {
                    tracing::info!(?from, %payload, "worker got message");
                }
            }
        });
        // Replies arrive once the orchestrator runs.
        let greeter = handle.clone();
        tokio::spawn(async move {
            let hello = serde_json::json!({ "hello": greeter.id() });
            if let Err(err) = greeter.send(None, hello).await {
                tracing::warn!(error = %err, "greeting not sent");
            }
        });
    }

    cluster.run().await.terminate();
}
