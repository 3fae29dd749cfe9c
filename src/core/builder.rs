use std::sync::Arc;

use tokio::sync::watch;

use super::cluster::{Cluster, ClusterHandle};
use super::control::Inbox;
use super::orchestrator::{Orchestrator, OrchestratorParams};
use crate::{
    config::ClusterConfig,
    core::ProcessRole,
    error::ClusterError,
    events::Bus,
    process::{Connect, ProcessSpawner, Spawn, StdioChannel, WORKER_ID_ENV},
    subscribers::Subscribe,
    transport::{WorkerId, WorkerMap},
};

/// Where this process learns whether it is a worker.
#[derive(Clone, Copy, Debug)]
enum Identity {
    /// `PROCVISOR_WORKER_ID` present → worker with that id.
    FromEnv,
    Primary,
    Worker(WorkerId),
}

/// Builder for constructing a [`Cluster`] with optional features.
pub struct ClusterBuilder {
    cfg: ClusterConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    spawner: Option<Arc<dyn Spawn>>,
    connector: Option<Arc<dyn Connect>>,
    identity: Identity,
    signals: bool,
}

impl ClusterBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ClusterConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            spawner: None,
            connector: None,
            identity: Identity::FromEnv,
            signals: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive cluster events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the worker spawner used by a master.
    ///
    /// Default: [`ProcessSpawner::current_exe`].
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Replaces the master channel used by a worker.
    ///
    /// Default: [`StdioChannel`].
    pub fn with_master_channel(mut self, connector: Arc<dyn Connect>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Treats this process as the primary one, whatever the environment says.
    pub fn as_primary(mut self) -> Self {
        self.identity = Identity::Primary;
        self
    }

    /// Treats this process as worker `id`, whatever the environment says.
    pub fn as_worker(mut self, id: WorkerId) -> Self {
        self.identity = Identity::Worker(id);
        self
    }

    /// Disables OS signal handling (reload and shutdown then only come from the handle).
    pub fn without_signals(mut self) -> Self {
        self.signals = false;
        self
    }

    /// Resolves the role and builds the cluster.
    ///
    /// Fails if the worker id in the environment is invalid, or if a pool-managing
    /// master has no spawner and the current executable cannot be located.
    pub fn build(self) -> Result<Cluster, ClusterError> {
        let worker_id = match self.identity {
            Identity::FromEnv => worker_id_from_env()?,
            Identity::Primary => None,
            Identity::Worker(id) => Some(id),
        };
        let role = ProcessRole::resolve(self.cfg.workers, worker_id.is_none());
        let worker_id = worker_id.filter(|_| role == ProcessRole::Worker);

        let spawner = if role == ProcessRole::Master && self.cfg.workers > 1 {
            Some(match self.spawner {
                Some(spawner) => spawner,
                None => Arc::new(ProcessSpawner::current_exe()?),
            })
        } else {
            None
        };
        let connector = (role == ProcessRole::Worker).then(|| {
            self.connector
                .unwrap_or_else(|| Arc::new(StdioChannel) as Arc<dyn Connect>)
        });

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (inbox, rx) = Inbox::channel();
        let (peers, workers) = watch::channel(WorkerMap::new());

        let handle = ClusterHandle::new(role, worker_id, inbox.clone(), bus.clone(), workers);
        let orchestrator = Orchestrator::new(OrchestratorParams {
            cfg: self.cfg,
            role,
            worker_id,
            bus: bus.clone(),
            inbox,
            rx,
            spawner,
            connector,
            peers,
            signals: self.signals,
        });
        Ok(Cluster::new(orchestrator, handle, bus, self.subscribers))
    }
}

fn worker_id_from_env() -> Result<Option<WorkerId>, ClusterError> {
    let invalid = |value: String| ClusterError::InvalidWorkerId {
        var: WORKER_ID_ENV,
        value,
    };
    match std::env::var(WORKER_ID_ENV) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| invalid(raw)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(raw)) => Err(invalid(raw.to_string_lossy().into_owned())),
    }
}
