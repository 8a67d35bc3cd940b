use crate::error::Result;
use crate::message::Message;
use crate::vector::Vector;

/// Static view of the run's workers. Identities are listed in index order
/// and never change during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    peers: Vec<String>,
    index: usize,
}

impl Topology {
    /// Builds the topology for the worker at `index` among `peers`.
    /// Panics if `index` is out of range.
    pub fn new(peers: Vec<String>, index: usize) -> Self {
        assert!(index < peers.len(), "topology: index {index} out of range");
        Self { peers, index }
    }

    /// Topology with `k` generated identities (`worker:000`, `worker:001`, ...).
    pub fn local(k: usize, index: usize) -> Self {
        Self::new((0..k).map(worker_name).collect(), index)
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn self_identity(&self) -> &str {
        &self.peers[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_workers(&self) -> usize {
        self.peers.len()
    }
}

/// Identity of the worker at `index`.
pub fn worker_name(index: usize) -> String {
    format!("worker:{index:03}")
}

/// The execution substrate a worker runs on.
///
/// Delivery must be reliable. A message sent before a barrier is visible to
/// its recipient only after that barrier, and never before. There is no
/// ordering among messages delivered by the same barrier.
pub trait MessageRouter {
    fn topology(&self) -> &Topology;

    /// Queues `message` for `target`. Delivered by the next [`sync`](Self::sync).
    fn send(&mut self, target: &str, message: Message) -> Result<()>;

    /// Blocks until every worker has called `sync` for the current round.
    fn sync(&mut self) -> Result<()>;

    /// Takes every message delivered by the most recent barrier.
    fn drain(&mut self) -> Vec<Message>;

    /// Next raw input record assigned to this worker, or `None` once exhausted.
    fn next_record(&mut self) -> Option<String>;

    /// Emits one result row.
    fn write_output(&mut self, identity: &str, point: &Vector) -> Result<()>;
}
