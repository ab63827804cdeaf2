//! Build runner, choosing and executing tasks as determined by out of date inputs.
//!
//! The scheduler keeps a fringe of nodes whose children have all been
//! resolved.  Draining the fringe either dispatches a node to the job
//! subsystem, finds it already up to date, or defers it (an ordering
//! predecessor is unfinished, or an equivalent node is already building).
//! Each resolved node then runs completion propagation, which decrements its
//! parents' counters and refills the fringe.

use crate::error::Error;
use crate::fs::{FileSystem, MTime};
use crate::graph::{BuiltStatus, Graph, Kind, NodeId};
use crate::progress::Progress;
use crate::queue::NodeQueue;
use crate::rng::Rng;
use crate::rules::{AppendCommands, Equivalence, MTimeStaleness, SameFile, Staleness, UseHandler};
use crate::task::{Finished, Jobs, Outcome};
use crate::trace;
use anyhow::{anyhow, Context};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Options {
    /// Shuffle the fringe before draining it.
    pub randomize: bool,
    pub seed: u64,
    /// Commands aren't really run, so don't trust storage for timestamps.
    pub dry_run: bool,
    /// Stop dispatching after this many failures; 0 means never stop.
    pub keep_going: usize,
    /// Stop at the first out of date node instead of building it.
    pub query: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            randomize: false,
            seed: 0,
            dry_run: false,
            keep_going: 1,
            query: false,
        }
    }
}

/// Final state of a requested target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    UpToDate,
    Rebuilt,
    NotRemade,
}

#[derive(Debug)]
pub struct Summary {
    /// Requested targets, in the order they were asked for.
    pub targets: Vec<(String, TargetStatus)>,
    /// Jobs that ran commands.
    pub ran: usize,
    pub failed: usize,
    /// In query mode, whether something needed building.
    pub out_of_date: bool,
}

impl Summary {
    pub fn success(&self) -> bool {
        self.failed == 0
            && self
                .targets
                .iter()
                .all(|(_, status)| *status != TargetStatus::NotRemade)
    }

    pub fn status(&self, name: &str) -> Option<TargetStatus> {
        self.targets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, status)| *status)
    }
}

pub struct Scheduler<'a> {
    graph: Graph,
    fs: &'a dyn FileSystem,
    progress: &'a mut dyn Progress,
    staleness: Box<dyn Staleness + 'a>,
    equivalence: Box<dyn Equivalence + 'a>,
    use_handler: Box<dyn UseHandler + 'a>,
    options: Options,
    rng: Rng,

    /// Nodes whose children are all resolved, awaiting examination.
    fringe: NodeQueue,
    /// Nodes deferred behind an equivalent node that is building.
    held_back: NodeQueue,
    /// The closure of the requested targets, by name.
    targets: BTreeMap<String, NodeId>,
    /// Targets as originally asked for.
    requested: Vec<NodeId>,
    /// Dispatched to the job subsystem and not yet finished.
    building: Vec<NodeId>,

    ran: usize,
    failed: usize,
    /// No further dispatching.
    stopped: bool,
    out_of_date: bool,
    fatal: Option<anyhow::Error>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: Graph,
        fs: &'a dyn FileSystem,
        progress: &'a mut dyn Progress,
        options: Options,
    ) -> Self {
        let rng = Rng::new(options.seed);
        Scheduler {
            graph,
            fs,
            progress,
            staleness: Box::new(MTimeStaleness),
            equivalence: Box::new(SameFile),
            use_handler: Box::new(AppendCommands),
            options,
            rng,
            fringe: NodeQueue::new(),
            held_back: NodeQueue::new(),
            targets: BTreeMap::new(),
            requested: Vec::new(),
            building: Vec::new(),
            ran: 0,
            failed: 0,
            stopped: false,
            out_of_date: false,
            fatal: None,
        }
    }

    pub fn with_staleness(mut self, staleness: impl Staleness + 'a) -> Self {
        self.staleness = Box::new(staleness);
        self
    }

    pub fn with_equivalence(mut self, equivalence: impl Equivalence + 'a) -> Self {
        self.equivalence = Box::new(equivalence);
        self
    }

    pub fn with_use_handler(mut self, use_handler: impl UseHandler + 'a) -> Self {
        self.use_handler = Box::new(use_handler);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn fringe(&self) -> &NodeQueue {
        &self.fringe
    }

    pub fn held_back(&self) -> &NodeQueue {
        &self.held_back
    }

    /// The closure of everything requested so far, by name.
    pub fn targets(&self) -> &BTreeMap<String, NodeId> {
        &self.targets
    }

    pub fn want_file(&mut self, name: &str) -> anyhow::Result<()> {
        let id = self
            .graph
            .lookup(name)
            .ok_or_else(|| anyhow!("don't know how to make {:?}", name))?;
        self.want_node(id);
        Ok(())
    }

    /// Add a target and everything it depends on to the build, queueing the
    /// nodes that are ready right away.
    pub fn want_node(&mut self, id: NodeId) {
        if !self.requested.contains(&id) {
            self.requested.push(id);
        }

        let mut examine = vec![id];
        while let Some(id) = examine.pop() {
            if self.graph.node(id).must_make {
                continue;
            }
            let node = self.graph.node_mut(id);
            node.must_make = true;
            let name = node.name.clone();
            let children = node.children.clone();
            self.targets.insert(name.clone(), id);

            // Use-only children are folded in here and never counted again.
            for &child in &children {
                if self.graph.node(child).kind == Kind::UseOnly {
                    self.use_handler.handle_use(&mut self.graph, child, id);
                    self.graph.node_mut(id).children_left -= 1;
                }
            }

            let children_left = self.graph.node(id).children_left;
            if children_left != 0 {
                debug!(node = %name, children_left, "not queuing, children left to build");
                for child in children {
                    let c = self.graph.node(child);
                    if !c.must_make && c.kind != Kind::UseOnly {
                        examine.push(child);
                    }
                }
            } else {
                debug!(node = %name, "queuing");
                self.fringe.push(id);
            }
        }

        if self.options.randomize {
            self.fringe.shuffle(&mut self.rng);
        }
    }

    /// Build everything wanted, until the fringe is drained and no job is
    /// outstanding or a fatal error stops the run.
    pub fn run(&mut self, jobs: &mut dyn Jobs) -> anyhow::Result<Summary> {
        self.start_jobs(jobs);
        while jobs.is_running() {
            let finished = match jobs.wait(Duration::from_millis(500)) {
                None => continue,
                Some(f) => f,
            };
            self.finish(finished);
            if !self.stopped {
                self.start_jobs(jobs);
            }
        }

        let stall = if self.fatal.is_none() && !self.stopped {
            self.find_stall_cycle()
        } else {
            None
        };
        let summary = self.sweep();
        if let Some(err) = self.fatal.take() {
            return Err(err);
        }
        if let Some(cycle) = stall {
            return Err(cycle.into());
        }
        Ok(summary)
    }

    /// Drain the fringe for as long as the job subsystem takes more work.
    fn start_jobs(&mut self, jobs: &mut dyn Jobs) {
        if self.options.randomize {
            self.fringe.shuffle(&mut self.rng);
        }
        trace::counter("fringe", self.fringe.len());
        while !self.stopped && jobs.can_start_more() {
            // Completions during the drain push onto the fringe; in random
            // mode they must not come out in push order.
            let next = if self.options.randomize {
                self.fringe.pop_random(&mut self.rng)
            } else {
                self.fringe.pop()
            };
            let id = match next {
                Some(id) => id,
                None => break,
            };
            if let Err(err) = self.try_to_make(id, jobs) {
                self.fatal_error(err);
            }
        }
    }

    fn try_to_make(&mut self, id: NodeId, jobs: &mut dyn Jobs) -> anyhow::Result<()> {
        let node = self.graph.node(id);
        debug!(node = %node.name, "examining");

        if node.built == BuiltStatus::HeldBack {
            debug!(node = %node.name, "already held back");
            return Ok(());
        }
        if node.children_left != 0 {
            debug!(node = %node.name, children_left = node.children_left, "not ready");
            return Ok(());
        }
        if node.built.has_been_built() {
            debug!(node = %node.name, "already made");
            return Ok(());
        }
        if self.has_predecessor_left_to_build(id) {
            debug!(node = %node.name, "dropping for now");
            return Ok(());
        }

        let equivalent = self
            .building
            .iter()
            .copied()
            .find(|&other| self.equivalence.equivalent(&self.graph, id, other));
        if let Some(other) = equivalent {
            debug!(
                node = %self.graph.name(id),
                watching = %self.graph.name(other),
                "holding back job"
            );
            let node = self.graph.node_mut(id);
            node.watched = Some(other);
            node.built = BuiltStatus::HeldBack;
            self.held_back.push(id);
            return Ok(());
        }

        let node = self.graph.node_mut(id);
        node.built = BuiltStatus::BeingMade;
        let name = node.name.clone();
        let mtime = self
            .fs
            .stat(&name)
            .with_context(|| format!("stat {}", name))?;
        self.graph.node_mut(id).mtime = mtime;

        if self.staleness.is_out_of_date(&self.graph, id) {
            if self.options.query {
                debug!(node = %name, "out of date, stopping query");
                self.graph.node_mut(id).built = BuiltStatus::Unknown;
                self.out_of_date = true;
                self.stopped = true;
                return Ok(());
            }
            debug!(node = %name, "out of date");
            let node = self.graph.node(id);
            self.progress.task_started(id, node);
            jobs.start(id, node);
            self.building.push(id);
        } else {
            debug!(node = %name, "up to date");
            self.graph.node_mut(id).built = BuiltStatus::UpToDate;
            self.update(id)?;
        }
        Ok(())
    }

    /// An in-scope predecessor that hasn't finished holds back its successor.
    fn has_predecessor_left_to_build(&self, id: NodeId) -> bool {
        self.graph.node(id).predecessors.iter().any(|&pred| {
            let p = self.graph.node(pred);
            let waiting = p.must_make && !p.built.is_terminal();
            if waiting {
                debug!(predecessor = %p.name, "predecessor not made yet");
            }
            waiting
        })
    }

    /// Handle a completion from the job subsystem.
    pub fn finish(&mut self, finished: Finished) {
        let id = finished.id;
        trace::task(self.graph.name(id), finished.tid, finished.span);
        self.building.retain(|&b| b != id);
        self.progress
            .task_finished(id, self.graph.node(id), &finished);

        let built = match finished.outcome {
            Outcome::UpToDate => BuiltStatus::UpToDate,
            Outcome::Unchanged => {
                self.ran += 1;
                BuiltStatus::UpToDate
            }
            Outcome::Rebuilt => {
                self.ran += 1;
                BuiltStatus::Rebuilt
            }
            Outcome::Failed => {
                self.ran += 1;
                self.fail(id);
                return;
            }
        };
        self.graph.node_mut(id).built = built;
        if let Err(err) = self.update(id) {
            self.fatal_error(err.into());
        }
    }

    /// Completion propagation: `id` has reached its final state, so settle
    /// its timestamp, release nodes waiting on it, and tell its parents and
    /// successors.
    pub fn update(&mut self, id: NodeId) -> Result<(), Error> {
        let node = self.graph.node(id);
        let name = node.name.clone();
        let kind = node.kind;
        let built = node.built;

        if built != BuiltStatus::UpToDate {
            // Some commands don't touch their output, and some storage is
            // slow to show a new mtime.  Either way, a node we just made is
            // newer than anything that depends on it.
            let old = node.mtime;
            let fresh = if self.options.dry_run {
                MTime::Missing
            } else {
                self.fs.invalidate(&name);
                self.fs.stat(&name).unwrap_or(MTime::Missing)
            };
            let mtime = match fresh {
                MTime::Stamp(_) if fresh != old => fresh,
                _ => MTime::now(),
            };
            debug!(node = %name, ?mtime, "update time");
            self.graph.node_mut(id).mtime = mtime;
        }

        self.release_held(id);

        let mtime = self.graph.node(id).mtime;
        // A use-only node was already discounted from its parents' counters
        // when they were seeded.
        if kind != Kind::UseOnly {
            let parents = self.graph.node(id).parents.clone();
            for parent in parents {
                let p = self.graph.node_mut(parent);
                if !p.must_make {
                    continue;
                }
                p.children_left -= 1;
                debug!(parent = %p.name, children_left = p.children_left, "decrement");
                if kind == Kind::Normal {
                    if built == BuiltStatus::Rebuilt {
                        p.child_rebuilt = true;
                    }
                    if mtime > p.newest_child {
                        p.newest_child = mtime;
                    }
                }
                if p.children_left == 0 {
                    debug!(node = %p.name, "queuing");
                    self.fringe.push(parent);
                } else if p.children_left < 0 {
                    return Err(Error::CycleThrough {
                        child: name,
                        parent: p.name.clone(),
                    });
                }
            }
        }

        self.requeue_successors(id);
        Ok(())
    }

    /// Put back on the fringe everything held back behind `id`.
    fn release_held(&mut self, id: NodeId) {
        let graph = &self.graph;
        let released = self
            .held_back
            .drain_matching(|h| graph.node(h).watched == Some(id));
        for h in released {
            debug!(node = %self.graph.name(h), finished = %self.graph.name(id), "releasing");
            let node = self.graph.node_mut(h);
            node.built = BuiltStatus::Unknown;
            node.watched = None;
            self.fringe.push(h);
        }
    }

    /// Successors that were ready but held off by the ordering check get
    /// another look now that `id` is done.
    fn requeue_successors(&mut self, id: NodeId) {
        let successors = self.graph.node(id).successors.clone();
        for succ in successors {
            let s = self.graph.node(succ);
            if s.must_make && s.children_left == 0 && s.built == BuiltStatus::Unknown {
                debug!(node = %s.name, "requeuing successor");
                self.fringe.push_new(succ);
            }
        }
    }

    fn fail(&mut self, id: NodeId) {
        self.graph.node_mut(id).built = BuiltStatus::Error;
        self.failed += 1;
        self.release_held(id);
        self.requeue_successors(id);
        self.abort_dependents(id);
        if self.options.keep_going != 0 && self.failed >= self.options.keep_going {
            if !self.stopped {
                debug!(failed = self.failed, "stopping after failures");
            }
            self.stopped = true;
        }
    }

    /// Everything in scope that depends on `id`, directly or not, can never
    /// be built now.
    fn abort_dependents(&mut self, id: NodeId) {
        let mut stack = self.graph.node(id).parents.clone();
        while let Some(p) = stack.pop() {
            let node = self.graph.node(p);
            if !node.must_make || node.built.has_been_built() {
                continue;
            }
            if node.built == BuiltStatus::HeldBack {
                self.held_back.drain_matching(|h| h == p);
            }
            let node = self.graph.node_mut(p);
            node.built = BuiltStatus::Aborted;
            node.watched = None;
            debug!(node = %node.name, "aborted");
            stack.extend(node.parents.iter().copied());
            self.requeue_successors(p);
        }
    }

    fn fatal_error(&mut self, err: anyhow::Error) {
        debug!(%err, "fatal");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.stopped = true;
    }

    /// Edges a stalled node is waiting along.
    fn stall_edges(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.graph.node(id);
        node.children
            .iter()
            .chain(node.predecessors.iter())
            .copied()
            .filter(|&n| {
                let n = self.graph.node(n);
                n.must_make && !n.built.is_terminal() && n.kind != Kind::UseOnly
            })
            .collect()
    }

    /// Called when the walk ran dry with in-scope nodes still unresolved:
    /// look for the cycle that starved them.
    fn find_stall_cycle(&self) -> Option<Error> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let mut color = vec![WHITE; self.graph.len()];
        for &start in self.targets.values() {
            if self.graph.node(start).built.is_terminal() || color[start.index()] != WHITE {
                continue;
            }
            color[start.index()] = GRAY;
            let mut stack = vec![(start, self.stall_edges(start), 0usize)];
            loop {
                let next = match stack.last_mut() {
                    None => break,
                    Some((_, edges, i)) if *i < edges.len() => {
                        *i += 1;
                        Some(edges[*i - 1])
                    }
                    Some(_) => None,
                };
                match next {
                    None => {
                        if let Some((done, _, _)) = stack.pop() {
                            color[done.index()] = BLACK;
                        }
                    }
                    Some(next) => match color[next.index()] {
                        WHITE => {
                            color[next.index()] = GRAY;
                            stack.push((next, self.stall_edges(next), 0));
                        }
                        GRAY => {
                            let pos = stack.iter().position(|(n, _, _)| *n == next)?;
                            let mut path: Vec<String> = stack[pos..]
                                .iter()
                                .map(|(n, _, _)| self.graph.name(*n).to_owned())
                                .collect();
                            path.push(self.graph.name(next).to_owned());
                            return Some(Error::Cycle { path });
                        }
                        _ => {}
                    },
                }
            }
        }
        None
    }

    /// Report the final state of what was asked for.  Nothing in scope is
    /// dropped silently.
    fn sweep(&mut self) -> Summary {
        for (name, &id) in &self.targets {
            let node = self.graph.node(id);
            if !node.built.is_terminal() {
                debug!(
                    node = %name,
                    status = ?node.built,
                    children_left = node.children_left,
                    "never resolved"
                );
            }
        }

        let mut targets = Vec::new();
        for &id in &self.requested {
            let node = self.graph.node(id);
            let status = match node.built {
                BuiltStatus::UpToDate => TargetStatus::UpToDate,
                BuiltStatus::Rebuilt => TargetStatus::Rebuilt,
                _ => TargetStatus::NotRemade,
            };
            if !self.options.query {
                match status {
                    TargetStatus::UpToDate => {
                        self.progress.log(&format!("`{}' is up to date.", node.name))
                    }
                    TargetStatus::NotRemade => self
                        .progress
                        .log(&format!("`{}' not remade because of errors.", node.name)),
                    TargetStatus::Rebuilt => {}
                }
            }
            targets.push((node.name.clone(), status));
        }

        Summary {
            targets,
            ran: self.ran,
            failed: self.failed,
            out_of_date: self.out_of_date,
        }
    }
}
