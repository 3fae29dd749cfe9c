#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use procvisor::transport::codec;
use procvisor::{
    ClusterError, Command, Connect, Envelope, Event, EventKind, Inbox, Link, Spawn, Spawned,
    WorkerExit, WorkerId,
};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

pub const WAIT: Duration = Duration::from_secs(5);

struct FakeWorker {
    inbox: Inbox,
    crash: CancellationToken,
}

#[derive(Default)]
struct Shared {
    workers: HashMap<WorkerId, FakeWorker>,
    received: Vec<(WorkerId, Envelope)>,
}

/// How a fake worker reacts to being told to leave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Behavior {
    /// Leaves with code 0 on RELOAD, EXIT or a closed channel.
    #[default]
    Obedient,
    /// Ignores RELOAD, EXIT and a closed channel; only a kill ends it.
    Stubborn,
    /// Ignores RELOAD and EXIT but leaves with code 0 once its channel closes.
    Lingering,
}

/// In-memory worker processes.
///
/// Each fake worker records every envelope it receives and leaves according to its
/// [`Behavior`], with code 1 on [`crash`](Self::crash) and with signal 9 when the
/// master kills it.
#[derive(Default)]
pub struct FakeSpawner {
    next_pid: AtomicU32,
    behavior: Behavior,
    /// 1-based spawn attempt that fails.
    fail_spawn: Option<u32>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Workers that ignore RELOAD and EXIT.
    pub fn stubborn() -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Stubborn,
            ..Self::default()
        })
    }

    /// Workers that ignore RELOAD and EXIT and only leave once the master closes
    /// their channel.
    pub fn lingering() -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Lingering,
            ..Self::default()
        })
    }

    /// Obedient workers, except that the `nth` spawn fails.
    pub fn failing_spawn(nth: u32) -> Arc<Self> {
        Arc::new(Self {
            fail_spawn: Some(nth),
            ..Self::default()
        })
    }

    pub fn crash(&self, id: WorkerId) {
        if let Some(worker) = self.shared.lock().unwrap().workers.get(&id) {
            worker.crash.cancel();
        }
    }

    /// Injects a raw frame as if worker `id` had written it.
    pub fn emit(&self, id: WorkerId, frame: impl Into<Vec<u8>>) {
        let shared = self.shared.lock().unwrap();
        let worker = shared.workers.get(&id).expect("unknown fake worker");
        worker.inbox.worker_frame(id, frame.into()).unwrap();
    }

    /// Injects a well-formed envelope from worker `id`.
    pub fn emit_envelope(&self, id: WorkerId, envelope: &Envelope) {
        self.emit(id, codec::encode(envelope).unwrap());
    }

    /// Every envelope delivered so far, in delivery order.
    pub fn received(&self) -> Vec<(WorkerId, Envelope)> {
        self.shared.lock().unwrap().received.clone()
    }

    pub fn received_by(&self, id: WorkerId) -> Vec<Command> {
        self.received()
            .into_iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, envelope)| envelope.command)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.received()
            .iter()
            .filter(|(_, envelope)| pred(&envelope.command))
            .count()
    }
}

#[async_trait]
impl Spawn for FakeSpawner {
    async fn spawn(&self, id: WorkerId, inbox: Inbox) -> Result<Spawned, ClusterError> {
        let attempt = self.next_pid.fetch_add(1, Ordering::Relaxed);
        if self.fail_spawn == Some(attempt + 1) {
            return Err(ClusterError::Spawn {
                id,
                source: std::io::Error::other("executable missing"),
            });
        }
        let pid = 1000 + attempt;
        let (link, mut outbound) = Link::channel();
        let kill = CancellationToken::new();
        let crash = CancellationToken::new();

        self.shared.lock().unwrap().workers.insert(
            id,
            FakeWorker {
                inbox: inbox.clone(),
                crash: crash.clone(),
            },
        );

        let shared = Arc::clone(&self.shared);
        let behavior = self.behavior;
        let killed = kill.clone();
        tokio::spawn(async move {
            let mut open = true;
            let exit = loop {
                tokio::select! {
                    envelope = outbound.recv(), if open => match envelope {
                        Some(envelope) => {
                            let leaving = matches!(envelope.command, Command::Reload | Command::Exit { .. });
                            shared.lock().unwrap().received.push((id, envelope));
                            if leaving && behavior == Behavior::Obedient {
                                break WorkerExit::code(0);
                            }
                        }
                        None if behavior == Behavior::Stubborn => open = false,
                        None => break WorkerExit::code(0),
                    },
                    _ = killed.cancelled() => break WorkerExit::signal(9),
                    _ = crash.cancelled() => break WorkerExit::code(1),
                }
            };
            let _ = inbox.worker_exited(id, exit);
        });

        Ok(Spawned::new(pid, link, kill))
    }
}

/// In-memory master channel for a worker-role cluster.
#[derive(Default)]
pub struct FakeMaster {
    inbox: Mutex<Option<Inbox>>,
    outbound: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
}

impl FakeMaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers a raw frame to the worker.
    pub fn send_raw(&self, frame: impl Into<Vec<u8>>) {
        let inbox = self.inbox.lock().unwrap();
        inbox
            .as_ref()
            .expect("worker not connected")
            .master_frame(frame.into())
            .unwrap();
    }

    pub fn send(&self, envelope: &Envelope) {
        self.send_raw(codec::encode(envelope).unwrap());
    }

    pub fn close(&self) {
        let inbox = self.inbox.lock().unwrap();
        inbox.as_ref().expect("worker not connected").master_closed().unwrap();
    }

    /// Next envelope the worker sent to the master.
    pub async fn recv(&self) -> Envelope {
        let mut rx = self
            .outbound
            .lock()
            .unwrap()
            .take()
            .expect("worker not connected");
        let envelope = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for the worker")
            .expect("worker link closed");
        *self.outbound.lock().unwrap() = Some(rx);
        envelope
    }

    /// True when the worker has sent nothing further.
    pub fn is_quiet(&self) -> bool {
        let mut outbound = self.outbound.lock().unwrap();
        let rx = outbound.as_mut().expect("worker not connected");
        rx.try_recv().is_err()
    }
}

impl Connect for FakeMaster {
    fn connect(&self, inbox: Inbox) -> Result<Link, ClusterError> {
        let (link, outbound) = Link::channel();
        *self.inbox.lock().unwrap() = Some(inbox);
        *self.outbound.lock().unwrap() = Some(outbound);
        Ok(link)
    }
}

/// Waits for the first event matching `pred`, skipping the rest.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&EventKind) -> bool,
) -> Event {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event.kind) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Collects every event up to and including `Exit`.
pub async fn until_exit_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    tokio::time::timeout(WAIT, async {
        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.expect("event bus closed");
            let done = event.is_exit();
            events.push(event);
            if done {
                return events;
            }
        }
    })
    .await
    .expect("timed out waiting for exit")
}

/// Kinds of every event up to and including `Exit`.
pub async fn until_exit(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
    until_exit_events(rx)
        .await
        .into_iter()
        .map(|event| event.kind)
        .collect()
}

pub fn id(raw: u32) -> WorkerId {
    WorkerId::new(raw)
}

/// Polls `cond` until it holds.
pub async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
