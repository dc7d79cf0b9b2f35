use crate::graph::WorkflowGraph;
use crate::orchestrator::{ExecutionReport, Orchestrator};
use relaycore::EngineError;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type Reply = oneshot::Sender<Result<ExecutionReport, EngineError>>;

struct Job {
    graph: Arc<WorkflowGraph>,
    input: Value,
    reply: Reply,
}

/// Runs whole executions on a fixed set of worker tasks
///
/// Parallelism is across executions only; each execution is still a single
/// sequential traversal. Workers share the orchestrator's event sink, so node
/// logs and progress events are published as they happen.
pub struct ExecutionPool {
    sender: mpsc::Sender<Job>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ExecutionPool {
    /// Spawn `workers` tasks on the current tokio runtime
    pub fn spawn(orchestrator: Arc<Orchestrator>, workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel = CancellationToken::new();

        let workers = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    orchestrator.clone(),
                    receiver.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            sender,
            cancel,
            workers,
        }
    }

    /// Queue an execution; waits while the queue is full
    pub async fn submit(
        &self,
        graph: Arc<WorkflowGraph>,
        input: Value,
    ) -> Result<ExecutionHandle, EngineError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Job {
                graph,
                input,
                reply,
            })
            .await
            .map_err(|_| EngineError::Pool("execution pool is shut down".to_string()))?;
        Ok(ExecutionHandle { receiver })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work, finish everything already queued, then stop
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// Stop after in-flight executions; queued ones are dropped
    pub async fn shutdown_now(self) {
        self.cancel.cancel();
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Resolves to the terminal result of a submitted execution
pub struct ExecutionHandle {
    receiver: oneshot::Receiver<Result<ExecutionReport, EngineError>>,
}

impl ExecutionHandle {
    pub async fn wait(self) -> Result<ExecutionReport, EngineError> {
        self.receiver.await.map_err(|_| {
            EngineError::Pool("execution was dropped before it completed".to_string())
        })?
    }
}

async fn worker_loop(
    worker: usize,
    orchestrator: Arc<Orchestrator>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    cancel: CancellationToken,
) {
    debug!(worker, "Execution worker started");
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };

        let Some(job) = job else { break };
        let result = orchestrator.execute(&job.graph, job.input).await;
        // The submitter may have stopped waiting
        let _ = job.reply.send(result);
    }
    info!(worker, "Execution worker stopped");
}
