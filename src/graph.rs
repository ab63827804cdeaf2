//! The build graph: target nodes and the relations between them.
//!
//! The graph is constructed once (by the loader, or by tests) and from then
//! on the scheduler only flips per-node status fields; it never adds or
//! removes edges.

use crate::fs::MTime;
use rustc_hash::FxHashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for NodeId {
    fn from(u: usize) -> NodeId {
        NodeId(u as u32)
    }
}

/// What role a node plays when it finishes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Kind {
    /// An ordinary target or source file.
    #[default]
    Normal,
    /// Spliced into its parents rather than built on its own account.
    UseOnly,
    /// Always-run action; finishing it never touches parent timestamps.
    ExecOnly,
}

/// Where a node is in its build lifecycle.
///
/// Unknown -> BeingMade -> {UpToDate, Rebuilt, Error, Aborted}, with the
/// detour Unknown -> HeldBack -> Unknown for nodes deferred behind an
/// equivalent node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BuiltStatus {
    #[default]
    Unknown,
    HeldBack,
    BeingMade,
    UpToDate,
    Rebuilt,
    Error,
    Aborted,
}

impl BuiltStatus {
    /// The node's own build decision has been resolved.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuiltStatus::UpToDate | BuiltStatus::Rebuilt | BuiltStatus::Error | BuiltStatus::Aborted
        )
    }

    /// Dispatched already, or resolved.
    pub fn has_been_built(self) -> bool {
        self == BuiltStatus::BeingMade || self.is_terminal()
    }
}

#[derive(Debug, Default)]
pub struct Node {
    pub name: String,
    pub kind: Kind,
    /// Commands run to make this node, as handed to the job subsystem.
    pub commands: Vec<String>,
    /// Nodes declared together on one rule line share a group.
    pub group: Option<u32>,

    pub built: BuiltStatus,
    /// Part of the closure of the current build.
    pub must_make: bool,
    /// Direct children not yet resolved.  Going negative means a cycle.
    pub children_left: i32,
    /// Some contributing child was actually rebuilt.
    pub child_rebuilt: bool,
    pub mtime: MTime,
    /// Newest timestamp seen among finished children.
    pub newest_child: MTime,
    /// The in-flight node this one is held back behind.
    pub watched: Option<NodeId>,

    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub predecessors: Vec<NodeId>,
    pub successors: Vec<NodeId>,
}

impl Node {
    fn new(name: String) -> Self {
        Node {
            name,
            ..Default::default()
        }
    }
}

#[derive(Default)]
pub struct Graph {
    nodes: Vec<Node>,
    by_name: FxHashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by name, creating it if it doesn't exist yet.
    pub fn node_id(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(Node::new(name.to_owned()));
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn all_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::from)
    }

    /// Record that `parent` depends on `child`.  Duplicate edges are ignored.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if self.nodes[parent.index()].children.contains(&child) {
            return;
        }
        let p = &mut self.nodes[parent.index()];
        p.children.push(child);
        p.children_left += 1;
        self.nodes[child.index()].parents.push(parent);
    }

    /// Record that `pred` must finish before `succ` is considered, without
    /// making `succ` depend on it.
    pub fn add_order(&mut self, pred: NodeId, succ: NodeId) {
        if pred == succ || self.nodes[pred.index()].successors.contains(&succ) {
            return;
        }
        self.nodes[pred.index()].successors.push(succ);
        self.nodes[succ.index()].predecessors.push(pred);
    }

    pub fn set_kind(&mut self, id: NodeId, kind: Kind) {
        self.nodes[id.index()].kind = kind;
    }
}
