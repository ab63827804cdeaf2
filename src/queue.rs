//! Worklists of nodes: the fringe of buildable nodes, and the nodes held back
//! behind an equivalent build.

use crate::graph::NodeId;
use crate::rng::Rng;

/// A growable, order-insensitive list of nodes.  Pops from the back.
#[derive(Debug, Default)]
pub struct NodeQueue {
    nodes: Vec<NodeId>,
}

impl NodeQueue {
    pub fn new() -> Self {
        NodeQueue::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, id: NodeId) {
        self.nodes.push(id);
    }

    /// Push unless already present.  Returns whether it was pushed.
    pub fn push_new(&mut self, id: NodeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.nodes.push(id);
        true
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        self.nodes.pop()
    }

    /// Remove a uniformly chosen entry.  Nodes pushed after the last shuffle
    /// get no positional advantage.
    pub fn pop_random(&mut self, rng: &mut Rng) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        let i = rng.below(self.nodes.len());
        Some(self.nodes.swap_remove(i))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn shuffle(&mut self, rng: &mut Rng) {
        rng.shuffle(&mut self.nodes);
    }

    /// Remove every entry matching `pred`, in order, keeping the rest in
    /// place.
    pub fn drain_matching(&mut self, mut pred: impl FnMut(NodeId) -> bool) -> Vec<NodeId> {
        let mut taken = Vec::new();
        self.nodes.retain(|&id| {
            if pred(id) {
                taken.push(id);
                false
            } else {
                true
            }
        });
        taken
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}
