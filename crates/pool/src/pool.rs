use crate::handler::{HandlerFactory, Task, TaskId};
use crate::{PoolConfig, PoolError, Result};
use evidence_protocol::{AggregateRequest, AggregatedResult};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

const COMMAND_BUFFER: usize = 256;

type Reply = oneshot::Sender<Result<AggregatedResult>>;

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub queue_max: usize,
    pub busy: usize,
    pub queued: usize,
    pub completed: u64,
    pub failed: u64,
    pub respawned: u64,
    pub degraded: u64,
    pub closed: bool,
}

/// Fixed-size pool of async workers with a bounded FIFO queue.
///
/// All slot and queue state lives in a single dispatcher task; callers and
/// workers only talk to it over channels. When every worker is busy and the
/// queue is full, `run` resolves to an empty result instead of waiting.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    command_tx: mpsc::Sender<PoolCommand>,
    stats_rx: watch::Receiver<PoolStats>,
    closed: AtomicBool,
}

enum PoolCommand {
    Run {
        request: AggregateRequest,
        reply: Reply,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

enum WorkerEvent {
    Finished {
        slot: usize,
        generation: u64,
        task_id: TaskId,
        result: Result<AggregatedResult>,
    },
    Exited {
        slot: usize,
        generation: u64,
        reason: String,
    },
}

impl WorkerPool {
    /// Start the dispatcher and `config.size` workers on the current tokio runtime.
    pub fn new(config: PoolConfig, factory: Arc<dyn HandlerFactory>) -> Result<Self> {
        let config = config.normalized();
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PoolError::Unavailable(format!("no async runtime: {e}")))?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(PoolStats {
            size: config.size,
            queue_max: config.queue_max,
            ..PoolStats::default()
        });

        let mut dispatcher = Dispatcher {
            config,
            factory,
            runtime: runtime.clone(),
            slots: Vec::with_capacity(config.size),
            queue: VecDeque::new(),
            next_task_id: 1,
            event_tx,
            stats_tx,
            counters: Counters::default(),
        };
        for slot in 0..config.size {
            let worker = dispatcher.spawn_worker(slot, 0);
            dispatcher.slots.push(worker);
        }
        runtime.spawn(dispatcher.run(command_rx, event_rx));

        log::info!(
            "Worker pool started: {} worker(s), queue capacity {}",
            config.size,
            config.queue_max
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                command_tx,
                stats_rx,
                closed: AtomicBool::new(false),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.stats_rx.borrow().clone()
    }

    /// Run one aggregation on a worker.
    ///
    /// Saturation is not an error: it yields an empty result. Errors are a
    /// closed pool, a worker that died mid-task, or a failing handler.
    pub async fn run(&self, request: AggregateRequest) -> Result<AggregatedResult> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let (reply, reply_rx) = oneshot::channel();
        if self
            .inner
            .command_tx
            .send(PoolCommand::Run { request, reply })
            .await
            .is_err()
        {
            return Err(self.gone_error());
        }
        reply_rx.await.unwrap_or_else(|_| Err(self.gone_error()))
    }

    /// Fail every queued and in-flight task, stop all workers, and refuse new work.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (done, done_rx) = oneshot::channel();
        if self
            .inner
            .command_tx
            .send(PoolCommand::Close { done })
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    fn gone_error(&self) -> PoolError {
        if self.is_closed() {
            PoolError::Closed
        } else {
            PoolError::Unavailable("dispatcher stopped".to_string())
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

struct Slot {
    generation: u64,
    jobs: mpsc::Sender<Task>,
    abort: AbortHandle,
    in_flight: Option<(TaskId, Reply)>,
}

struct Pending {
    task: Task,
    reply: Reply,
}

#[derive(Default)]
struct Counters {
    completed: u64,
    failed: u64,
    respawned: u64,
    degraded: u64,
}

struct Dispatcher {
    config: PoolConfig,
    factory: Arc<dyn HandlerFactory>,
    runtime: tokio::runtime::Handle,
    slots: Vec<Slot>,
    queue: VecDeque<Pending>,
    next_task_id: TaskId,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    stats_tx: watch::Sender<PoolStats>,
    counters: Counters,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<PoolCommand>,
        mut event_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(PoolCommand::Run { request, reply }) => self.submit(request, reply),
                    Some(PoolCommand::Close { done }) => {
                        self.shutdown();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = event_rx.recv() => self.on_event(event),
            }
            self.publish(false);
        }
        self.publish(true);
        log::debug!("Worker pool dispatcher stopped");
    }

    fn submit(&mut self, request: AggregateRequest, reply: Reply) {
        let task = Task {
            id: self.next_task_id,
            request,
        };
        self.next_task_id += 1;

        if let Some(slot) = self.slots.iter().position(|s| s.in_flight.is_none()) {
            self.assign(slot, Pending { task, reply });
        } else if self.queue.len() < self.config.queue_max {
            self.queue.push_back(Pending { task, reply });
        } else {
            self.counters.degraded += 1;
            log::warn!(
                "Worker pool saturated ({} busy, {} queued); returning no evidence for task {}",
                self.slots.len(),
                self.queue.len(),
                task.id
            );
            let _ = reply.send(Ok(AggregatedResult::empty(task.request.query)));
        }
    }

    fn assign(&mut self, slot: usize, pending: Pending) {
        let Pending { task, reply } = pending;
        let task_id = task.id;
        match self.slots[slot].jobs.try_send(task) {
            Ok(()) => self.slots[slot].in_flight = Some((task_id, reply)),
            Err(_) => {
                // Worker is gone but its exit has not been reported yet.
                self.counters.failed += 1;
                let _ = reply.send(Err(PoolError::WorkerFailed {
                    slot,
                    reason: "worker stopped before accepting the task".to_string(),
                }));
                self.respawn(slot);
            }
        }
    }

    fn on_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Finished {
                slot,
                generation,
                task_id,
                result,
            } => {
                if self.slots[slot].generation != generation {
                    return;
                }
                match self.slots[slot].in_flight.take() {
                    Some((id, reply)) if id == task_id => {
                        if result.is_ok() {
                            self.counters.completed += 1;
                        } else {
                            self.counters.failed += 1;
                        }
                        let _ = reply.send(result);
                    }
                    other => {
                        log::warn!("Worker {slot} reported unknown task {task_id}");
                        self.slots[slot].in_flight = other;
                        return;
                    }
                }
                self.dispatch_next(slot);
            }
            WorkerEvent::Exited {
                slot,
                generation,
                reason,
            } => {
                if self.slots[slot].generation != generation {
                    return;
                }
                log::error!("Worker {slot} exited abnormally: {reason}");
                if let Some((task_id, reply)) = self.slots[slot].in_flight.take() {
                    self.counters.failed += 1;
                    log::warn!("Task {task_id} failed with worker {slot}");
                    let _ = reply.send(Err(PoolError::WorkerFailed { slot, reason }));
                }
                self.respawn(slot);
                self.dispatch_next(slot);
            }
        }
    }

    fn dispatch_next(&mut self, slot: usize) {
        if self.slots[slot].in_flight.is_some() {
            return;
        }
        if let Some(pending) = self.queue.pop_front() {
            self.assign(slot, pending);
        }
    }

    fn respawn(&mut self, slot: usize) {
        let generation = self.slots[slot].generation + 1;
        self.slots[slot].abort.abort();
        self.slots[slot] = self.spawn_worker(slot, generation);
        self.counters.respawned += 1;
        log::info!("Worker {slot} respawned (generation {generation})");
    }

    fn spawn_worker(&self, slot: usize, generation: u64) -> Slot {
        let (jobs, mut job_rx) = mpsc::channel::<Task>(1);
        let mut handler = self.factory.create(slot);
        let events = self.event_tx.clone();

        let worker = self.runtime.spawn(async move {
            while let Some(task) = job_rx.recv().await {
                let task_id = task.id;
                let result = handler.handle(task).await;
                let finished = WorkerEvent::Finished {
                    slot,
                    generation,
                    task_id,
                    result,
                };
                if events.send(finished).is_err() {
                    break;
                }
            }
        });
        let abort = worker.abort_handle();

        // Supervisor: turn a panic or unexpected exit into an event.
        let events = self.event_tx.clone();
        self.runtime.spawn(async move {
            let reason = match worker.await {
                Ok(()) => "worker loop ended".to_string(),
                Err(err) if err.is_cancelled() => return,
                Err(err) => format!("worker panicked: {err}"),
            };
            let _ = events.send(WorkerEvent::Exited {
                slot,
                generation,
                reason,
            });
        });

        Slot {
            generation,
            jobs,
            abort,
            in_flight: None,
        }
    }

    fn shutdown(&mut self) {
        let queued = self.queue.len();
        for pending in self.queue.drain(..) {
            let _ = pending.reply.send(Err(PoolError::Closed));
        }
        let mut in_flight = 0;
        for slot in &mut self.slots {
            if let Some((_, reply)) = slot.in_flight.take() {
                in_flight += 1;
                let _ = reply.send(Err(PoolError::Closed));
            }
            slot.abort.abort();
        }
        log::info!("Worker pool closed ({in_flight} in flight, {queued} queued tasks failed)");
    }

    fn publish(&self, closed: bool) {
        let busy = self.slots.iter().filter(|s| s.in_flight.is_some()).count();
        let _ = self.stats_tx.send(PoolStats {
            size: self.config.size,
            queue_max: self.config.queue_max,
            busy,
            queued: self.queue.len(),
            completed: self.counters.completed,
            failed: self.counters.failed,
            respawned: self.counters.respawned,
            degraded: self.counters.degraded,
            closed,
        });
    }
}
