//! Distributed k-means over bulk-synchronous message passing.
//!
//! A run has `k` workers and `k` clusters; each worker owns exactly one
//! cluster and a shard of the input points. Workers share no memory. They
//! exchange points and cluster snapshots by message, and a global barrier
//! separates every send from the matching receive.
//!
//! # Usage
//!
//! ```
//! use bsp_kmeans::{Config, LocalCluster};
//!
//! let records = ["0 0", "0 1", "10 10", "10 11"].map(String::from);
//! let run = LocalCluster::new(Config::new(2, 10))
//!     .records(records)
//!     .run()
//!     .unwrap();
//!
//! for (identity, point) in &run.output {
//!     println!("{identity}\t{point}");
//! }
//! ```
//!
//! # Rounds
//!
//! Round 0 scatters the input randomly. Every later round moves each point to
//! the worker with the nearest centroid, recomputes each worker's centroid,
//! and broadcasts it to everyone. Since every worker receives the same
//! broadcasts, every worker reaches the same convergence verdict in the same
//! round without a coordinator.
//!
//! A cluster left without points is restarted at one of the largest
//! cluster's outliers: the members farthest from its centroid, which every
//! worker ships with its broadcast.
//!
//! To run on a different substrate, implement [`MessageRouter`] and call
//! [`run_worker`] once per worker.

mod cluster;
mod config;
mod convergence;
mod driver;
mod engine;
mod error;
mod local;
mod message;
mod outlier;
mod reseed;
mod router;
mod vector;

pub use cluster::{ClusterState, ClusterTable, mean};
pub use config::Config;
pub use convergence::{ConvergenceChecker, DEFAULT_EPSILON};
pub use driver::run_worker;
pub use engine::{Phase, RunSummary, Verdict, WorkerEngine};
pub use error::{KMeansError, Result};
pub use local::{LocalCluster, LocalRun};
pub use message::{Envelope, Message};
pub use outlier::{Outlier, OutlierSet};
pub use reseed::{Reseed, reseed};
pub use router::{MessageRouter, Topology, worker_name};
pub use vector::Vector;
