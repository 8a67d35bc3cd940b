//! The per-worker round state machine.
//!
//! Each phase is a method that takes the messages drained since the last
//! barrier and returns the messages to send before the next one. The engine
//! never touches the substrate itself, so rounds can be driven by hand in
//! tests or by [`run_worker`](crate::run_worker) against a real router.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterState, ClusterTable};
use crate::config::Config;
use crate::convergence::ConvergenceChecker;
use crate::error::{KMeansError, Result};
use crate::message::{Envelope, Message};
use crate::reseed::reseed;
use crate::router::Topology;
use crate::vector::Vector;

/// Where a worker is in its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Assign,
    Collect,
    Update,
    ConvergeCheck,
    Terminate,
    Halted,
}

/// Outcome of a convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Another round follows.
    Continue,
    /// The global table stopped moving.
    Converged,
    /// The round cap was reached without convergence.
    MaxIterations,
}

impl Verdict {
    pub fn is_final(self) -> bool {
        !matches!(self, Verdict::Continue)
    }
}

/// Final state of one worker after a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub identity: String,
    /// Number of rounds executed.
    pub rounds: usize,
    pub converged: bool,
    /// Every worker's cluster as last seen by this worker.
    pub clusters: Vec<ClusterState>,
}

/// One worker's share of a distributed k-means run: a shard of points, the
/// cluster this worker owns, and its view of everyone else's cluster.
pub struct WorkerEngine {
    config: Config,
    topology: Topology,
    checker: ConvergenceChecker,
    phase: Phase,
    round: usize,
    me: ClusterState,
    shard: Vec<Vector>,
    table: ClusterTable,
    dim: Option<usize>,
    converged: bool,
    rng: StdRng,
}

impl WorkerEngine {
    /// Creates an engine in [`Phase::Init`].
    ///
    /// Fails with [`KMeansError::Config`] if the configuration is invalid or
    /// the topology does not have exactly `k` workers.
    pub fn new(config: Config, topology: Topology) -> Result<Self> {
        config.validate()?;
        if topology.num_workers() != config.k {
            return Err(KMeansError::Config(format!(
                "k is {} but the topology has {} workers",
                config.k,
                topology.num_workers()
            )));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(topology.index() as u64)),
            None => StdRng::from_entropy(),
        };
        let me = ClusterState::empty(topology.self_identity(), config.outlier_capacity());
        Ok(Self {
            checker: ConvergenceChecker::new(config.epsilon),
            config,
            topology,
            phase: Phase::Init,
            round: 0,
            me,
            shard: Vec::new(),
            table: ClusterTable::new(),
            dim: None,
            converged: false,
            rng,
        })
    }

    pub fn identity(&self) -> &str {
        self.topology.self_identity()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// Points currently held by this worker.
    pub fn shard(&self) -> &[Vector] {
        &self.shard
    }

    /// This worker's own cluster.
    pub fn cluster(&self) -> &ClusterState {
        &self.me
    }

    /// Last installed global cluster table.
    pub fn table(&self) -> &ClusterTable {
        &self.table
    }

    /// Round 0: parses this worker's input records and scatters every point
    /// to a uniformly random worker.
    ///
    /// Blank records are skipped. Malformed records are logged and skipped.
    pub fn init<I>(&mut self, records: I) -> Vec<Envelope>
    where
        I: IntoIterator<Item = String>,
    {
        self.expect_phase(Phase::Init);
        let mut out = Vec::new();
        let mut skipped = 0usize;
        for record in records {
            if record.trim().is_empty() {
                continue;
            }
            let point = match record.parse::<Vector>() {
                Ok(p) => p,
                Err(e) => {
                    warn!("{}: skipping record {:?}: {}", self.identity(), record, e);
                    skipped += 1;
                    continue;
                }
            };
            let target = self.rng.gen_range(0..self.config.k);
            out.push(Envelope::point(&self.topology.peers()[target], point));
        }
        debug!(
            "{}: scattered {} points ({} records skipped)",
            self.identity(),
            out.len(),
            skipped
        );
        self.phase = Phase::Collect;
        out
    }

    /// Rounds after the first: hands every point whose nearest centroid
    /// belongs to another worker over to that worker.
    pub fn assign(&mut self) -> Result<Vec<Envelope>> {
        self.expect_phase(Phase::Assign);
        let mut targets = Vec::with_capacity(self.shard.len());
        for p in &self.shard {
            targets.push(self.nearest(p)?);
        }

        let mut out = Vec::new();
        let mut kept = Vec::with_capacity(self.shard.len());
        for (point, target) in std::mem::take(&mut self.shard).into_iter().zip(targets) {
            match target {
                Some(target) => out.push(Envelope::point(target, point)),
                None => kept.push(point),
            }
        }
        self.shard = kept;
        debug!(
            "{} round {}: moved {} points, kept {}",
            self.identity(),
            self.round,
            out.len(),
            self.shard.len()
        );
        self.phase = Phase::Collect;
        Ok(out)
    }

    /// Absorbs the points delivered by the last barrier into the shard.
    ///
    /// Fails with [`KMeansError::DimensionMismatch`] if a point disagrees with
    /// the dimensionality this worker first saw.
    pub fn collect(&mut self, inbox: Vec<Message>) -> Result<()> {
        self.expect_phase(Phase::Collect);
        let mut received = 0usize;
        for msg in inbox {
            match msg {
                Message::Point { point } => {
                    self.accept_point(point)?;
                    received += 1;
                }
                Message::Broadcast { sender, .. } => {
                    warn!(
                        "{} round {}: ignoring broadcast from {} during collect",
                        self.identity(),
                        self.round,
                        sender
                    );
                }
            }
        }
        debug!(
            "{} round {}: received {} points, holding {}",
            self.identity(),
            self.round,
            received,
            self.shard.len()
        );
        self.phase = Phase::Update;
        Ok(())
    }

    /// Recomputes this worker's centroid and outliers from its shard and
    /// broadcasts the result to every worker, itself included.
    pub fn update(&mut self) -> Result<Vec<Envelope>> {
        self.expect_phase(Phase::Update);
        self.me.recompute(&self.shard)?;
        debug!("{} round {}: {}", self.identity(), self.round, self.me);

        let out: Vec<Envelope> = self
            .topology
            .peers()
            .iter()
            .map(|peer| Envelope::broadcast(peer, self.topology.self_identity(), self.me.clone()))
            .collect();
        self.phase = Phase::ConvergeCheck;
        Ok(out)
    }

    /// Folds this round's broadcasts into a new global table, decides
    /// convergence against the previous one, and repairs empty clusters.
    ///
    /// If some worker's broadcast is missing the round is not converged and
    /// the previous table stays installed.
    pub fn converge_check(&mut self, inbox: Vec<Message>) -> Result<Verdict> {
        self.expect_phase(Phase::ConvergeCheck);
        let mut received = ClusterTable::new();
        for msg in inbox {
            match msg {
                Message::Broadcast { sender, cluster } => {
                    if !self.topology.peers().contains(&sender) {
                        warn!("{}: broadcast from unknown worker {}", self.identity(), sender);
                        continue;
                    }
                    if received.insert(sender.clone(), cluster).is_some() {
                        warn!(
                            "{} round {}: duplicate broadcast from {}",
                            self.identity(),
                            self.round,
                            sender
                        );
                    }
                }
                Message::Point { point } => {
                    warn!(
                        "{} round {}: late point during convergence check",
                        self.identity(),
                        self.round
                    );
                    self.accept_point(point)?;
                }
            }
        }

        if received.len() < self.config.k {
            warn!(
                "{} round {}: only {} of {} broadcasts arrived",
                self.identity(),
                self.round,
                received.len(),
                self.config.k
            );
            self.converged = false;
        } else {
            self.converged = self.checker.check(&self.table, &received)?;
            for r in reseed(&mut received)? {
                warn!(
                    "{} round {}: reseeded empty cluster {} from {} at [{}]",
                    self.identity(),
                    self.round,
                    r.identity,
                    r.donor,
                    r.centroid
                );
                if r.identity == self.topology.self_identity() {
                    self.me.population = 1;
                    self.me.dim = r.centroid.dim();
                    self.me.centroid = Some(r.centroid);
                }
            }
            self.table = received;
        }

        let verdict = if self.converged {
            info!("{}: converged in round {}", self.identity(), self.round);
            Verdict::Converged
        } else if self.round + 1 >= self.config.max_iterations {
            info!(
                "{}: reached the maximum of {} rounds",
                self.identity(),
                self.config.max_iterations
            );
            Verdict::MaxIterations
        } else {
            Verdict::Continue
        };

        if verdict.is_final() {
            self.phase = Phase::Terminate;
        } else {
            self.round += 1;
            self.phase = Phase::Assign;
        }
        Ok(verdict)
    }

    /// Releases every held point paired with this worker's identity.
    pub fn terminate(&mut self) -> Vec<(String, Vector)> {
        self.expect_phase(Phase::Terminate);
        let identity = self.topology.self_identity().to_string();
        let rows = std::mem::take(&mut self.shard)
            .into_iter()
            .map(|p| (identity.clone(), p))
            .collect();
        self.phase = Phase::Halted;
        rows
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            identity: self.identity().to_string(),
            rounds: self.round + 1,
            converged: self.converged,
            clusters: self.table.values().cloned().collect(),
        }
    }

    /// Identity of the worker whose centroid is nearest to `point`, or `None`
    /// if that is this worker. Ties go to the smallest identity, so two
    /// coincident centroids collapse into one and the other empties out.
    /// Clusters without a centroid are skipped.
    fn nearest(&self, point: &Vector) -> Result<Option<String>> {
        let mut best: Option<(&str, f64)> = None;
        for (identity, cluster) in &self.table {
            let Some(centroid) = &cluster.centroid else {
                continue;
            };
            let d = point.distance(centroid)?;
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((identity, d));
            }
        }
        Ok(best
            .map(|(identity, _)| identity)
            .filter(|identity| *identity != self.identity())
            .map(str::to_string))
    }

    fn accept_point(&mut self, point: Vector) -> Result<()> {
        match self.dim {
            None => self.dim = Some(point.dim()),
            Some(expected) if expected != point.dim() => {
                return Err(KMeansError::DimensionMismatch {
                    expected,
                    got: point.dim(),
                });
            }
            Some(_) => {}
        }
        self.shard.push(point);
        Ok(())
    }

    fn expect_phase(&self, expected: Phase) {
        assert_eq!(
            self.phase, expected,
            "engine: {:?} step called in {:?} phase",
            expected, self.phase
        );
    }
}
