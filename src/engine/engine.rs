//! Engine implementation.
//!
//! The engine owns all scheduling state: the active-contract index, the
//! in-memory snapshot mirrored to the durable store, the pending-deletion
//! set, the bounded pending queue, and the idle worker pool. A single
//! serialized run loop is the only mutator of that state; callers reach it
//! through a command mailbox, so no locks guard the indexes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::types::{EngineCommand, EngineError, EngineState, WatchOutcome, WatchReport};
use super::worker::{WatchAssignment, Worker};
use crate::config::EngineConfig;
use crate::core::contract::Contract;
use crate::core::types::ContractId;
use crate::events::{Event, EventBus};
use crate::storage::Store;

/// Buffer size for the command channel between the engine surface and the
/// run loop.
const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Deadline-triggered task engine.
///
/// Callers register contracts with [`enqueue`](Engine::enqueue); unless
/// [`prune`](Engine::prune)d first, each contract's timeout action runs
/// exactly once, at or shortly after its deadline, on one of a bounded pool
/// of workers.
///
/// An engine is constructed, started once, and shut down once; after
/// [`shutdown`](Engine::shutdown) every call fails with
/// [`EngineError::Closed`].
pub struct Engine<C: Contract> {
    command_tx: mpsc::Sender<EngineCommand<C>>,
    pending_tx: mpsc::Sender<Arc<C>>,
    root: CancellationToken,
    state: Arc<RwLock<EngineState>>,
    event_bus: Arc<EventBus>,
    runtime: StdMutex<Option<RunLoop<C>>>,
    recovered: StdMutex<Vec<Arc<C>>>,
    loop_task: StdMutex<Option<JoinHandle<()>>>,
}

impl<C: Contract> Engine<C> {
    /// Create a new engine with the given configuration and optional store.
    ///
    /// Spawns `config.workers` idle workers. If a store is supplied, its
    /// persisted history is loaded here (exactly once) and every loaded
    /// contract is re-registered and queued for dispatch when the engine
    /// starts. Fails with [`EngineError::Store`] if the load fails.
    pub async fn new(
        config: EngineConfig,
        store: Option<Arc<dyn Store<C>>>,
    ) -> Result<Self, EngineError> {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let heartbeat = config.heartbeat.max(Duration::from_millis(1));

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let (pending_tx, pending_rx) = mpsc::channel(queue_capacity);
        let (done_tx, done_rx) = mpsc::channel(workers);
        let (idle_tx, idle_rx) = mpsc::channel(workers);

        for i in 0..workers {
            idle_tx
                .try_send(Worker::new(i + 1, idle_tx.clone()))
                .map_err(|_| EngineError::Channel("failed to seed worker pool".to_string()))?;
        }

        let root = CancellationToken::new();
        let event_bus = Arc::new(EventBus::new());

        let mut active = HashMap::new();
        let mut snapshot = HashMap::new();
        let mut recovered = Vec::new();

        if let Some(store) = &store {
            let history = store.load().await?;
            if !history.is_empty() {
                tracing::info!(contracts = history.len(), "loaded persisted contract history");
            }
            for (id, contract) in history {
                let contract = Arc::new(contract);
                active.insert(id.clone(), CancellationToken::new());
                snapshot.insert(id, contract.clone());
                recovered.push(contract);
            }
        }

        let runtime = RunLoop {
            heartbeat,
            workers_total: workers,
            in_flight: 0,
            root: root.clone(),
            command_rx,
            pending_rx,
            done_tx,
            done_rx,
            idle_rx,
            active,
            snapshot,
            pending_deletion: HashSet::new(),
            store,
            event_bus: event_bus.clone(),
        };

        Ok(Self {
            command_tx,
            pending_tx,
            root,
            state: Arc::new(RwLock::new(EngineState::Idle)),
            event_bus,
            runtime: StdMutex::new(Some(runtime)),
            recovered: StdMutex::new(recovered),
            loop_task: StdMutex::new(None),
        })
    }

    /// Replace the event bus. Only meaningful before [`start`](Engine::start).
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Get the current engine state.
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Check if the engine is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == EngineState::Running
    }

    /// Start the run loop.
    ///
    /// Idempotent: calling `start` on a running engine is a no-op. Starting
    /// a closed engine fails with [`EngineError::Closed`]. Contracts loaded
    /// from the store are flushed onto the pending queue here, in the order
    /// the store returned them.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        match *state {
            EngineState::Running => return Ok(()),
            EngineState::Closed => return Err(EngineError::Closed),
            EngineState::Idle => {}
        }

        let mut runtime = self
            .runtime
            .lock()
            .map_err(|_| EngineError::Channel("runtime lock poisoned".to_string()))?
            .take()
            .ok_or(EngineError::Closed)?;
        runtime.event_bus = self.event_bus.clone();

        let handle = tokio::spawn(runtime.run());
        *self
            .loop_task
            .lock()
            .map_err(|_| EngineError::Channel("loop task lock poisoned".to_string()))? =
            Some(handle);

        let recovered = std::mem::take(
            &mut *self
                .recovered
                .lock()
                .map_err(|_| EngineError::Channel("recovered lock poisoned".to_string()))?,
        );
        if !recovered.is_empty() {
            let pending_tx = self.pending_tx.clone();
            tokio::spawn(async move {
                for contract in recovered {
                    if pending_tx.send(contract).await.is_err() {
                        break;
                    }
                }
            });
        }

        *state = EngineState::Running;
        Ok(())
    }

    /// Enqueue a contract.
    ///
    /// Fails with [`EngineError::DuplicateContract`] if the identifier is
    /// already active. On success the contract is recorded, persisted (when
    /// a store is configured), and queued for dispatch at the loop's next
    /// iteration, not synchronously. If the pending queue is full this call
    /// blocks until the loop drains room, providing backpressure.
    ///
    /// A store failure rolls the in-memory registration back; the enqueue is
    /// considered to have failed.
    pub async fn enqueue(&self, contract: C) -> Result<(), EngineError> {
        self.ensure_running().await?;

        let contract = Arc::new(contract);

        // Reserve the queue slot first so backpressure applies before the
        // contract becomes visible in the active index.
        let permit = self
            .pending_tx
            .reserve()
            .await
            .map_err(|_| EngineError::Closed)?;

        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Register {
                contract: contract.clone(),
                response: response_tx,
            })
            .await
            .map_err(|_| EngineError::Closed)?;
        response_rx.await.map_err(|_| EngineError::Closed)??;

        permit.send(contract);
        Ok(())
    }

    /// Prune a contract: cancel its watch and mark it for deletion.
    ///
    /// Safe to call at any point in the contract's lifecycle: before
    /// dispatch, concurrently with dispatch, or after completion. The
    /// contract's timeout action is guaranteed not to run once this call
    /// returns, unless it had already started.
    pub async fn prune(&self, id: impl Into<ContractId>) -> Result<(), EngineError> {
        self.ensure_running().await?;

        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Prune {
                id: id.into(),
                response: response_tx,
            })
            .await
            .map_err(|_| EngineError::Closed)?;
        response_rx.await.map_err(|_| EngineError::Closed)
    }

    /// Number of currently-active contracts.
    pub async fn active_count(&self) -> Result<usize, EngineError> {
        self.query(|response| EngineCommand::ActiveCount { response })
            .await
    }

    /// Whether the given contract is currently active.
    pub async fn is_active(&self, id: impl Into<ContractId>) -> Result<bool, EngineError> {
        let id = id.into();
        self.query(move |response| EngineCommand::IsActive { id, response })
            .await
    }

    /// Number of workers not currently bound to a contract.
    pub async fn idle_workers(&self) -> Result<usize, EngineError> {
        self.query(|response| EngineCommand::IdleWorkers { response })
            .await
    }

    /// Shut the engine down.
    ///
    /// Cancels the root signal (releasing every bound worker without firing
    /// its action), tears down all scheduling state, and transitions the
    /// engine to its terminal state. Subsequent calls on the engine fail
    /// with [`EngineError::Closed`].
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.write().await;
            match *state {
                EngineState::Closed => return Err(EngineError::Closed),
                EngineState::Idle => {
                    *state = EngineState::Closed;
                    self.root.cancel();
                    if let Ok(mut runtime) = self.runtime.lock() {
                        runtime.take();
                    }
                    return Ok(());
                }
                EngineState::Running => {
                    *state = EngineState::Closed;
                }
            }
        }

        let (response_tx, response_rx) = oneshot::channel();
        if self
            .command_tx
            .send(EngineCommand::Shutdown {
                response: response_tx,
            })
            .await
            .is_ok()
        {
            let _ = response_rx.await;
        }

        let task = self.loop_task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }

    async fn ensure_running(&self) -> Result<(), EngineError> {
        match *self.state.read().await {
            EngineState::Running => Ok(()),
            EngineState::Idle => Err(EngineError::NotStarted),
            EngineState::Closed => Err(EngineError::Closed),
        }
    }

    async fn query<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand<C>,
    ) -> Result<T, EngineError> {
        self.ensure_running().await?;

        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| EngineError::Closed)?;
        response_rx.await.map_err(|_| EngineError::Closed)
    }
}

/// State owned exclusively by the run loop.
struct RunLoop<C: Contract> {
    heartbeat: Duration,
    workers_total: usize,
    in_flight: usize,
    root: CancellationToken,
    command_rx: mpsc::Receiver<EngineCommand<C>>,
    pending_rx: mpsc::Receiver<Arc<C>>,
    done_tx: mpsc::Sender<WatchReport>,
    done_rx: mpsc::Receiver<WatchReport>,
    idle_rx: mpsc::Receiver<Worker>,
    active: HashMap<ContractId, CancellationToken>,
    snapshot: HashMap<ContractId, Arc<C>>,
    pending_deletion: HashSet<ContractId>,
    store: Option<Arc<dyn Store<C>>>,
    event_bus: Arc<EventBus>,
}

impl<C: Contract> RunLoop<C> {
    /// Main engine loop.
    ///
    /// Single consumer of the pending queue and the completion channel; the
    /// sole reader and writer of `active`, `snapshot`, and
    /// `pending_deletion`. Dispatch only races commands through this one
    /// select, so a prune and a dispatch for the same identifier resolve in
    /// the order the loop observes them.
    async fn run(mut self) {
        // one worker is parked here so the pending queue is only polled
        // when a dispatch could actually proceed
        let mut parked: Option<Worker> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.root.cancelled() => {
                    self.teardown();
                    break;
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Register { contract, response }) => {
                            self.handle_register(contract, response).await;
                        }
                        Some(EngineCommand::Prune { id, response }) => {
                            self.handle_prune(id, response);
                        }
                        Some(EngineCommand::ActiveCount { response }) => {
                            let _ = response.send(self.active.len());
                        }
                        Some(EngineCommand::IsActive { id, response }) => {
                            let _ = response.send(self.active.contains_key(&id));
                        }
                        Some(EngineCommand::IdleWorkers { response }) => {
                            let _ = response.send(self.workers_total - self.in_flight);
                        }
                        Some(EngineCommand::Shutdown { response }) => {
                            self.teardown();
                            let _ = response.send(());
                            break;
                        }
                        // engine handle dropped without an explicit shutdown
                        None => {
                            self.teardown();
                            break;
                        }
                    }
                }

                Some(report) = self.done_rx.recv() => {
                    self.handle_report(report).await;
                }

                Some(worker) = self.idle_rx.recv(), if parked.is_none() => {
                    parked = Some(worker);
                }

                Some(contract) = self.pending_rx.recv(), if parked.is_some() => {
                    let id = contract.identifier().clone();

                    if self.pending_deletion.remove(&id) {
                        // pruned before a worker was ever assigned; the mark
                        // is consumed exactly once, here
                        if let Some(token) = self.active.remove(&id) {
                            token.cancel();
                        }
                        self.snapshot.remove(&id);
                        self.persist_snapshot().await;
                        tracing::debug!(id = %id, "contract dropped before dispatch");
                        self.event_bus.emit(Event::dropped(id)).await;
                        continue;
                    }

                    let Some(hot_exit) = self.active.get(&id).cloned() else {
                        // registration was rolled back after the contract
                        // was queued; nothing to watch
                        continue;
                    };

                    // the precondition on this arm guarantees a parked worker
                    let Some(worker) = parked.take() else {
                        continue;
                    };
                    self.in_flight += 1;
                    tracing::debug!(id = %id, worker = worker.id(), "contract dispatched");
                    self.event_bus.emit(Event::dispatched(id, worker.id())).await;
                    worker.start(WatchAssignment {
                        root: self.root.clone(),
                        hot_exit,
                        heartbeat: self.heartbeat,
                        contract,
                        done: self.done_tx.clone(),
                    });
                }

                else => {
                    self.teardown();
                    break;
                }
            }
        }
    }

    /// Register a contract: duplicate check, cancellation handle, snapshot
    /// entry, and the store's additive enqueue.
    async fn handle_register(
        &mut self,
        contract: Arc<C>,
        response: oneshot::Sender<Result<(), EngineError>>,
    ) {
        let id = contract.identifier().clone();

        if self.active.contains_key(&id) {
            let _ = response.send(Err(EngineError::DuplicateContract(id.to_string())));
            return;
        }

        // a fresh registration supersedes any prune of a prior incarnation
        self.pending_deletion.remove(&id);

        self.active.insert(id.clone(), CancellationToken::new());
        self.snapshot.insert(id.clone(), contract.clone());

        if let Some(store) = &self.store {
            if let Err(e) = store.enqueue(contract.as_ref()).await {
                // roll the registration back; the enqueue failed as a whole
                self.active.remove(&id);
                self.snapshot.remove(&id);
                let _ = response.send(Err(EngineError::Store(e)));
                return;
            }
        }

        if response.send(Ok(())).is_err() {
            // caller went away before pushing the contract onto the queue;
            // undo the registration so the id does not stay active forever
            self.active.remove(&id);
            self.snapshot.remove(&id);
            if let Some(store) = &self.store {
                if let Err(e) = store.dequeue(&id).await {
                    tracing::warn!(id = %id, error = %e, "failed to undo store enqueue");
                }
            }
            return;
        }

        tracing::debug!(id = %id, deadline = %contract.deadline(), "contract enqueued");
        self.event_bus
            .emit(Event::enqueued(id, contract.deadline()))
            .await;
    }

    /// Cancel the contract's handle if one exists and mark the identifier
    /// for deletion.
    fn handle_prune(&mut self, id: ContractId, response: oneshot::Sender<()>) {
        if let Some(token) = self.active.get(&id) {
            token.cancel();
        }
        self.pending_deletion.insert(id);
        let _ = response.send(());
    }

    /// A worker finished a watch: remove the contract from the active index
    /// and the snapshot, then persist.
    async fn handle_report(&mut self, report: WatchReport) {
        let WatchReport {
            contract_id: id,
            outcome,
        } = report;

        self.in_flight = self.in_flight.saturating_sub(1);
        self.active.remove(&id);
        self.snapshot.remove(&id);
        self.pending_deletion.remove(&id);
        self.persist_snapshot().await;

        match outcome {
            WatchOutcome::Fired { action_failed } => {
                tracing::debug!(id = %id, action_failed, "contract fired");
                self.event_bus.emit(Event::fired(id, action_failed)).await;
            }
            WatchOutcome::Cancelled => {
                tracing::debug!(id = %id, "contract pruned");
                self.event_bus.emit(Event::pruned(id)).await;
            }
        }
    }

    /// Mirror the in-memory snapshot to the store: clear, then save in full.
    ///
    /// Completion-time store failures have no caller to surface to; they are
    /// logged and absorbed.
    async fn persist_snapshot(&self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = store.clear().await {
            tracing::warn!(error = %e, "failed to clear store before snapshot");
            return;
        }
        if let Err(e) = store.save(&self.snapshot).await {
            tracing::warn!(error = %e, "failed to persist snapshot");
        }
    }

    /// Release workers and invalidate all state. The loop exits after this.
    fn teardown(&mut self) {
        self.root.cancel();
        for (_, token) in self.active.drain() {
            token.cancel();
        }
        self.snapshot.clear();
        self.pending_deletion.clear();
        self.command_rx.close();
        self.pending_rx.close();
        self.done_rx.close();
        self.idle_rx.close();
        tracing::debug!("engine loop stopped");
    }
}
