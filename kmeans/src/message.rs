use serde::{Deserialize, Serialize};

use crate::cluster::ClusterState;
use crate::vector::Vector;

/// A message exchanged between workers. Payloads are owned copies; the
/// sender keeps no reference to what it sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A point handed to the worker that now owns it.
    Point { point: Vector },

    /// A worker's cluster snapshot for the current round.
    Broadcast {
        sender: String,
        cluster: ClusterState,
    },
}

/// An outbound message and the worker it is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: String,
    pub message: Message,
}

impl Envelope {
    pub fn point(target: impl Into<String>, point: Vector) -> Self {
        Self {
            target: target.into(),
            message: Message::Point { point },
        }
    }

    pub fn broadcast(target: impl Into<String>, sender: &str, cluster: ClusterState) -> Self {
        Self {
            target: target.into(),
            message: Message::Broadcast {
                sender: sender.to_string(),
                cluster,
            },
        }
    }
}
