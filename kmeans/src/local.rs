//! In-process substrate: every worker is a thread, every mailbox a mutex.
//!
//! Delivery follows the barrier contract. A worker's sends are buffered in
//! its own outbox, pushed to the recipients' inboxes on entering the
//! barrier, and moved into the recipients' delivered queues between the
//! barrier's two phases. Nothing sent in round r can be seen before round
//! r's barrier completes, and nothing from round r+1 can leak into round r.

use std::sync::{Condvar, Mutex};
use std::thread;

use tracing::{info, warn};

use crate::config::Config;
use crate::driver::run_worker;
use crate::engine::RunSummary;
use crate::error::{KMeansError, Result};
use crate::message::Message;
use crate::router::{MessageRouter, Topology};
use crate::vector::Vector;

/// Runs a whole clustering job inside one process, one thread per worker.
///
/// # Example
///
/// ```
/// use bsp_kmeans::{Config, LocalCluster};
///
/// let records = ["0 0", "0 1", "10 10", "10 11"].map(String::from);
/// let run = LocalCluster::new(Config::new(2, 10).with_seed(1))
///     .records(records)
///     .run()
///     .unwrap();
/// assert_eq!(run.output.len(), 4);
/// ```
pub struct LocalCluster {
    config: Config,
    inputs: Vec<Vec<String>>,
}

/// Everything a finished local run produced.
#[derive(Debug)]
pub struct LocalRun {
    /// One summary per worker, in worker index order.
    pub summaries: Vec<RunSummary>,
    /// `(identity, point)` rows from every worker, in worker index order.
    pub output: Vec<(String, Vector)>,
}

impl LocalCluster {
    pub fn new(config: Config) -> Self {
        let inputs = vec![Vec::new(); config.k];
        Self { config, inputs }
    }

    /// Splits `records` over the workers round-robin.
    pub fn records<I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let k = self.inputs.len().max(1);
        for (i, r) in records.into_iter().enumerate() {
            if let Some(shard) = self.inputs.get_mut(i % k) {
                shard.push(r);
            }
        }
        self
    }

    /// Uses explicit per-worker input shards. There must be exactly `k`.
    pub fn shards(mut self, inputs: Vec<Vec<String>>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Runs all workers to completion.
    ///
    /// If any worker fails, the others are released from the barrier with
    /// [`KMeansError::Aborted`] and the first real error is returned.
    pub fn run(self) -> Result<LocalRun> {
        self.config.validate()?;
        let k = self.config.k;
        if self.inputs.len() != k {
            return Err(KMeansError::Config(format!(
                "{} input shards for {} workers",
                self.inputs.len(),
                k
            )));
        }
        info!("local run: {} workers, {} rounds max", k, self.config.max_iterations);

        let shared = Shared {
            inboxes: (0..k).map(|_| Mutex::new(Vec::new())).collect(),
            barrier: AbortableBarrier::new(k),
        };
        let shared = &shared;

        let results: Vec<WorkerResult> = thread::scope(|s| {
            let handles: Vec<_> = self
                .inputs
                .into_iter()
                .enumerate()
                .map(|(index, input)| {
                    let config = self.config.clone();
                    s.spawn(move || -> WorkerResult {
                        let mut guard = AbortGuard {
                            barrier: &shared.barrier,
                            armed: true,
                        };
                        let mut router = LocalRouter {
                            topology: Topology::local(k, index),
                            shared,
                            outbox: Vec::new(),
                            delivered: Vec::new(),
                            input: input.into_iter(),
                            output: Vec::new(),
                        };
                        let summary = run_worker(config, &mut router)?;
                        guard.armed = false;
                        Ok((summary, router.output))
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(KMeansError::Router("worker panicked".into())))
                })
                .collect()
        });

        let mut summaries = Vec::with_capacity(k);
        let mut output = Vec::new();
        let mut aborted = false;
        let mut failure = None;
        for result in results {
            match result {
                Ok((summary, rows)) => {
                    summaries.push(summary);
                    output.extend(rows);
                }
                Err(KMeansError::Aborted) => aborted = true,
                Err(e) => {
                    warn!("local run: worker failed: {}", e);
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        if aborted {
            return Err(KMeansError::Aborted);
        }
        Ok(LocalRun { summaries, output })
    }
}

type WorkerResult = Result<(RunSummary, Vec<(String, Vector)>)>;

struct Shared {
    inboxes: Vec<Mutex<Vec<Message>>>,
    barrier: AbortableBarrier,
}

/// Reusable barrier that can be torn down when a participant dies.
struct AbortableBarrier {
    state: Mutex<BarrierState>,
    notify: Condvar,
    parties: usize,
}

struct BarrierState {
    waiting: usize,
    generation: u64,
    aborted: bool,
}

impl AbortableBarrier {
    fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                waiting: 0,
                generation: 0,
                aborted: false,
            }),
            notify: Condvar::new(),
            parties,
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.aborted {
            return Err(KMeansError::Aborted);
        }
        let generation = state.generation;
        state.waiting += 1;
        if state.waiting == self.parties {
            state.waiting = 0;
            state.generation += 1;
            self.notify.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.aborted {
            state = self.notify.wait(state).unwrap();
        }
        if state.generation == generation {
            return Err(KMeansError::Aborted);
        }
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock().unwrap();
        state.aborted = true;
        self.notify.notify_all();
    }
}

/// Aborts the barrier when dropped while armed, so a worker that errors out
/// or panics releases its peers.
struct AbortGuard<'a> {
    barrier: &'a AbortableBarrier,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.barrier.abort();
        }
    }
}

struct LocalRouter<'a> {
    topology: Topology,
    shared: &'a Shared,
    outbox: Vec<(usize, Message)>,
    delivered: Vec<Message>,
    input: std::vec::IntoIter<String>,
    output: Vec<(String, Vector)>,
}

impl MessageRouter for LocalRouter<'_> {
    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn send(&mut self, target: &str, message: Message) -> Result<()> {
        let index = self
            .topology
            .peers()
            .iter()
            .position(|p| p == target)
            .ok_or_else(|| KMeansError::Router(format!("unknown worker {target}")))?;
        self.outbox.push((index, message));
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        for (index, message) in self.outbox.drain(..) {
            self.shared.inboxes[index].lock().unwrap().push(message);
        }
        self.shared.barrier.wait()?;
        let mine = std::mem::take(&mut *self.shared.inboxes[self.topology.index()].lock().unwrap());
        self.delivered.extend(mine);
        self.shared.barrier.wait()
    }

    fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.delivered)
    }

    fn next_record(&mut self) -> Option<String> {
        self.input.next()
    }

    fn write_output(&mut self, identity: &str, point: &Vector) -> Result<()> {
        self.output.push((identity.to_string(), point.clone()));
        Ok(())
    }
}
