//! Structural errors that end a run.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A node's unresolved-children counter went below zero.
    #[error("child {child} discovered graph cycle through {parent}")]
    CycleThrough { child: String, parent: String },

    /// The walk stalled and a cycle was found among the unbuilt nodes.
    /// The path starts and ends at the same node.
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

impl Error {
    /// Whether `name` takes part in the reported cycle.
    pub fn mentions(&self, name: &str) -> bool {
        match self {
            Error::CycleThrough { child, parent } => child == name || parent == name,
            Error::Cycle { path } => path.iter().any(|n| n == name),
        }
    }
}
