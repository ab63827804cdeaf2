//! Decisions the scheduler delegates: whether a node is out of date, whether
//! two nodes are the same build in disguise, and how a use-only node is
//! folded into its parent.

use crate::canon::canon_path;
use crate::fs::MTime;
use crate::graph::{Graph, Kind, NodeId};

/// Decides whether a node needs building.  Called once the node's own
/// timestamp has been read into `Node::mtime`.
pub trait Staleness {
    fn is_out_of_date(&self, graph: &Graph, id: NodeId) -> bool;
}

/// Decides whether building `a` while `b` is in flight would be redundant.
pub trait Equivalence {
    fn equivalent(&self, graph: &Graph, a: NodeId, b: NodeId) -> bool;
}

/// Splices a use-only child into a parent.
pub trait UseHandler {
    fn handle_use(&mut self, graph: &mut Graph, child: NodeId, parent: NodeId);
}

/// Timestamp comparison in the usual make fashion.
#[derive(Default)]
pub struct MTimeStaleness;

impl Staleness for MTimeStaleness {
    fn is_out_of_date(&self, graph: &Graph, id: NodeId) -> bool {
        let node = graph.node(id);
        if node.kind == Kind::ExecOnly || node.child_rebuilt {
            return true;
        }
        match node.mtime {
            MTime::Missing => true,
            mtime => node.newest_child > mtime,
        }
    }
}

/// Nodes naming the same file, or declared together on one rule line.
#[derive(Default)]
pub struct SameFile;

impl Equivalence for SameFile {
    fn equivalent(&self, graph: &Graph, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let (na, nb) = (graph.node(a), graph.node(b));
        if na.group.is_some() && na.group == nb.group {
            return true;
        }
        canon_path(&na.name) == canon_path(&nb.name)
    }
}

/// Never coalesces anything.
pub struct NoEquivalence;

impl Equivalence for NoEquivalence {
    fn equivalent(&self, _graph: &Graph, _a: NodeId, _b: NodeId) -> bool {
        false
    }
}

/// Appends the use-only node's commands to the parent's.
#[derive(Default)]
pub struct AppendCommands;

impl UseHandler for AppendCommands {
    fn handle_use(&mut self, graph: &mut Graph, child: NodeId, parent: NodeId) {
        let commands = graph.node(child).commands.clone();
        graph.node_mut(parent).commands.extend(commands);
    }
}
