// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, error};

use crate::{
    codegen::{CodegenContext, CodegenStatistics},
    node::compare_nodes,
    CompilationError,
    CompilationResult,
    NodeFactory,
    NodeId,
};

use super::countdown::Countdown;

struct Task {
    node: NodeId,
    countdown: Arc<Countdown>,
}

/// A fixed set of threads that compile `MethodCode` nodes. Each thread owns
/// its own [`CodegenContext`].
pub(super) struct WorkerPool {
    factory: Arc<NodeFactory>,
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<CodegenStatistics>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(factory: Arc<NodeFactory>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = unbounded();

        let workers = (0..worker_count)
            .map(|index| {
                let factory = Arc::clone(&factory);
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("codegen-{index}"))
                    .spawn(move || run_worker(&factory, &receiver))
            })
            .filter_map(|handle| match handle {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("Failed to start a compilation worker: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("Started {} compilation workers", workers.len());

        Self {
            factory,
            sender: Some(sender),
            workers,
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Compiles every node of the batch and returns once all of them have
    /// their code attached.
    pub fn compile_batch(&self, nodes: &[NodeId]) -> CompilationResult<()> {
        let Some(sender) = &self.sender else {
            return Err(CompilationError::WorkerPanicked);
        };

        if self.workers.is_empty() {
            return Err(CompilationError::WorkerPanicked);
        }

        let countdown = Arc::new(Countdown::new(nodes.len()));
        for node in nodes {
            let task = Task {
                node: *node,
                countdown: Arc::clone(&countdown),
            };

            sender.send(task).map_err(|_| CompilationError::WorkerPanicked)?;
        }

        countdown.wait(|a, b| compare_nodes(&self.factory, a, b))
    }

    /// Stops the workers and sums up what they did.
    pub fn shutdown(mut self) -> CodegenStatistics {
        self.join()
    }

    fn join(&mut self) -> CodegenStatistics {
        self.sender = None;

        let mut total = CodegenStatistics::default();
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(statistics) => total += statistics,
                Err(..) => error!("A compilation worker panicked"),
            }
        }
        total
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

fn run_worker(factory: &NodeFactory, receiver: &Receiver<Task>) -> CodegenStatistics {
    let mut context = CodegenContext::new(factory.platform());
    let mut total = CodegenStatistics::default();

    for task in receiver {
        let result = catch_unwind(AssertUnwindSafe(|| context.compile_method(factory, task.node)));

        match result {
            Ok(Ok(code)) => factory.set_method_code(task.node, code),
            Ok(Err(e)) => task.countdown.record_error(task.node, e),
            Err(..) => {
                error!("Panic while compiling {}", factory.display_name(task.node));
                task.countdown.record_error(task.node, CompilationError::WorkerPanicked);

                // The context may be half way through a method.
                total += context.statistics();
                context = CodegenContext::new(factory.platform());
            }
        }

        task.countdown.signal();
    }

    total += context.statistics();
    total
}
