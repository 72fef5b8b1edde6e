//! Concurrent materialization of a listing.
//!
//! One producer task drains the paginator into a bounded work queue, a
//! fixed pool of workers fetches item details, and the consumer puts the
//! completions back into listing order. Every position holds a permit of
//! the window semaphore from the moment it is pulled until it is emitted,
//! which bounds the queue, the work in flight and the reorder buffer.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::client::FetchClient;
use crate::error::{Error, Result};
use crate::model::Record;
use crate::pipeline::{item_error, materialize, Paginator};
use crate::session::SessionHandle;

pub const DEFAULT_WORKERS: usize = 15;
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadOptions {
    pub workers: usize,
    /// Work queue capacity, in multiples of `workers`.
    pub queue_multiplier: usize,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_multiplier: DEFAULT_QUEUE_MULTIPLIER,
        }
    }
}

impl PreloadOptions {
    fn queue_capacity(&self) -> usize {
        self.workers.max(1) * self.queue_multiplier.max(1)
    }

    fn window(&self) -> usize {
        self.queue_capacity() + self.workers.max(1)
    }
}

struct Job<R> {
    position: usize,
    summary: R,
    permit: OwnedSemaphorePermit,
}

struct Completion<R> {
    position: usize,
    outcome: Result<R>,
    _permit: OwnedSemaphorePermit,
}

/// Materializes summaries concurrently and emits them in listing order.
///
/// Dropping the engine stops the producer and every worker.
pub struct PreloadEngine<R: Record> {
    results: mpsc::UnboundedReceiver<Completion<R>>,
    reorder: BTreeMap<usize, Completion<R>>,
    next_position: usize,
    finished: bool,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl<R: Record> PreloadEngine<R> {
    /// Start the producer and workers. Must be called within a tokio runtime.
    pub fn spawn(
        paginator: Paginator<R>,
        client: Arc<FetchClient>,
        handle: SessionHandle,
        options: PreloadOptions,
    ) -> Self {
        let workers = options.workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job<R>>(options.queue_capacity());
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let window = Arc::new(Semaphore::new(options.window()));
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        tracing::debug!(
            "Preloading with {} workers, queue {}, window {}",
            workers,
            options.queue_capacity(),
            options.window()
        );

        tasks.spawn(produce(
            paginator,
            job_tx,
            result_tx.clone(),
            window,
            cancel.clone(),
        ));

        let job_rx = Arc::new(Mutex::new(job_rx));
        for _ in 0..workers {
            tasks.spawn(work(
                Arc::clone(&job_rx),
                result_tx.clone(),
                Arc::clone(&client),
                handle.clone(),
                cancel.clone(),
            ));
        }
        drop(result_tx);

        Self {
            results: result_rx,
            reorder: BTreeMap::new(),
            next_position: 0,
            finished: false,
            cancel,
            tasks,
        }
    }

    /// Next item in listing order, `None` once the listing is exhausted or
    /// a fatal error was emitted.
    pub async fn next(&mut self) -> Option<Result<R>> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(completion) = self.reorder.remove(&self.next_position) {
                self.next_position += 1;
                let outcome = completion.outcome;
                if matches!(&outcome, Err(e) if !e.is_item_error()) {
                    self.shutdown();
                }
                return Some(outcome);
            }

            match self.results.recv().await {
                Some(completion) => {
                    self.reorder.insert(completion.position, completion);
                }
                None => {
                    let stranded = !self.reorder.is_empty();
                    self.shutdown();
                    if stranded {
                        tracing::error!("Preload worker stopped before finishing its item");
                        return Some(Err(Error::Api(format!(
                            "item #{} was lost by a preload worker",
                            self.next_position
                        ))));
                    }
                    return None;
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.finished = true;
        self.cancel.cancel();
        self.tasks.abort_all();
        self.reorder.clear();
    }
}

impl<R: Record> Drop for PreloadEngine<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.tasks.abort_all();
    }
}

async fn produce<R: Record>(
    mut paginator: Paginator<R>,
    jobs: mpsc::Sender<Job<R>>,
    results: mpsc::UnboundedSender<Completion<R>>,
    window: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    let mut position = 0;
    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&window).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = paginator.next() => next,
        };

        match next {
            Some(Ok(summary)) => {
                let job = Job {
                    position,
                    summary,
                    permit,
                };
                if jobs.send(job).await.is_err() {
                    break;
                }
                position += 1;
            }
            Some(Err(e)) => {
                let _ = results.send(Completion {
                    position,
                    outcome: Err(e),
                    _permit: permit,
                });
                break;
            }
            None => break,
        }
    }
    tracing::debug!("Preload producer finished after {} items", position);
}

async fn work<R: Record>(
    jobs: Arc<Mutex<mpsc::Receiver<Job<R>>>>,
    results: mpsc::UnboundedSender<Completion<R>>,
    client: Arc<FetchClient>,
    handle: SessionHandle,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = jobs.recv() => job,
            }
        };
        let Some(Job {
            position,
            summary,
            permit,
        }) = job
        else {
            break;
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = materialize(&client, &handle, summary.clone()) => outcome,
        };
        let outcome = outcome.map_err(|e| {
            let err = item_error(&summary, position, e);
            if err.is_item_error() {
                tracing::warn!("{}", err);
            }
            err
        });

        let completion = Completion {
            position,
            outcome,
            _permit: permit,
        };
        if results.send(completion).is_err() {
            break;
        }
    }
}
