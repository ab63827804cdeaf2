//! Runs build tasks, potentially in parallel.
//! Unaware of the scheduling state; just command execution.
//!
//! Every finished task, however it ended, comes back through one channel, so
//! the scheduler sees completions strictly one at a time.

use crate::fs::{FileSystem, MTime, RealFileSystem};
use crate::graph::{Node, NodeId};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// How a node's build ended, as reported by the job subsystem.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing needed running.
    UpToDate,
    /// Commands ran but the output didn't change.
    Unchanged,
    /// Commands ran and produced new output.
    Rebuilt,
    Failed,
}

pub struct Finished {
    /// A (faked) "thread id", used to put different finished builds in different
    /// tracks in a performance trace.
    pub tid: usize,
    pub id: NodeId,
    pub span: (Instant, Instant),
    pub outcome: Outcome,
    /// Echoed commands and console output.
    pub output: Vec<u8>,
}

/// The job subsystem as seen by the scheduler.
pub trait Jobs {
    fn can_start_more(&self) -> bool;
    fn is_running(&self) -> bool;
    /// Begin making `node`.  Exactly one Finished comes back for it.
    fn start(&mut self, id: NodeId, node: &Node);
    /// Wait for a job to complete, with a timeout.
    /// If the timeout elapses return None.
    fn wait(&mut self, dur: Duration) -> Option<Finished>;
}

/// What a worker thread needs to know about the node it is making.
struct Task {
    name: String,
    commands: Vec<String>,
    child_rebuilt: bool,
    leaf: bool,
}

impl Task {
    fn from_node(node: &Node) -> Self {
        Task {
            name: node.name.clone(),
            commands: node.commands.clone(),
            child_rebuilt: node.child_rebuilt,
            leaf: node.children.is_empty(),
        }
    }
}

/// A command line with make's "@" (don't echo) and "-" (ignore failure)
/// prefixes peeled off.
struct Command<'a> {
    cmdline: &'a str,
    silent: bool,
    ignore_errors: bool,
}

fn parse_command(mut cmdline: &str) -> Command<'_> {
    let mut silent = false;
    let mut ignore_errors = false;
    loop {
        if let Some(rest) = cmdline.strip_prefix('@') {
            silent = true;
            cmdline = rest;
        } else if let Some(rest) = cmdline.strip_prefix('-') {
            ignore_errors = true;
            cmdline = rest;
        } else {
            break;
        }
    }
    Command {
        cmdline: cmdline.trim_start(),
        silent,
        ignore_errors,
    }
}

fn shell(cmdline: &str) -> std::process::Command {
    #[cfg(windows)]
    {
        let mut cmd = std::process::Command::new("cmd");
        cmd.arg("/c").arg(cmdline);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = std::process::Command::new("/bin/sh");
        cmd.arg("-c").arg(cmdline);
        cmd
    }
}

#[cfg(unix)]
fn describe_failure(status: std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(libc::SIGINT) => "interrupted".to_owned(),
        Some(sig) => format!("signal {}", sig),
        None => format!("exit {}", status.code().unwrap_or(-1)),
    }
}

#[cfg(not(unix))]
fn describe_failure(status: std::process::ExitStatus) -> String {
    format!("exit {}", status.code().unwrap_or(-1))
}

/// Makes a node by running its commands through the shell.
/// Returns an Err() if we failed outside of the commands themselves.
fn run_task(task: &Task, dry_run: bool) -> anyhow::Result<(Outcome, Vec<u8>)> {
    let mut output = Vec::new();
    let fs = RealFileSystem::new();

    if task.commands.is_empty() {
        if task.child_rebuilt {
            return Ok((Outcome::Rebuilt, output));
        }
        if task.leaf && fs.stat(&task.name)? == MTime::Missing {
            output.extend_from_slice(format!("don't know how to make {}\n", task.name).as_bytes());
            return Ok((Outcome::Failed, output));
        }
        return Ok((Outcome::UpToDate, output));
    }

    if dry_run {
        for cmd in &task.commands {
            output.extend_from_slice(parse_command(cmd).cmdline.as_bytes());
            output.push(b'\n');
        }
        return Ok((Outcome::Rebuilt, output));
    }

    let before = fs.stat(&task.name)?;
    for cmd in &task.commands {
        let cmd = parse_command(cmd);
        if !cmd.silent {
            output.extend_from_slice(cmd.cmdline.as_bytes());
            output.push(b'\n');
        }
        let mut result = shell(cmd.cmdline).output()?;
        output.append(&mut result.stdout);
        output.append(&mut result.stderr);
        if !result.status.success() {
            let why = describe_failure(result.status);
            if cmd.ignore_errors {
                output.extend_from_slice(format!("{} (ignored)\n", why).as_bytes());
                continue;
            }
            output.extend_from_slice(format!("{}\n", why).as_bytes());
            return Ok((Outcome::Failed, output));
        }
    }
    let after = fs.stat(&task.name)?;
    let outcome = if after == MTime::Missing || after != before {
        Outcome::Rebuilt
    } else {
        Outcome::Unchanged
    };
    Ok((outcome, output))
}

/// Tracks faked "thread ids" -- integers assigned to build tasks to track
/// paralllelism in perf trace output.
#[derive(Default)]
struct ThreadIds {
    /// An entry is true when claimed, false or nonexistent otherwise.
    slots: Vec<bool>,
}
impl ThreadIds {
    fn claim(&mut self) -> usize {
        match self.slots.iter().position(|&used| !used) {
            Some(idx) => {
                self.slots[idx] = true;
                idx
            }
            None => {
                let idx = self.slots.len();
                self.slots.push(true);
                idx
            }
        }
    }

    fn release(&mut self, slot: usize) {
        self.slots[slot] = false;
    }
}

/// The shell job runner: one thread per running node, at most `parallelism`
/// at a time.
pub struct Runner {
    finished_send: mpsc::Sender<Finished>,
    finished_recv: mpsc::Receiver<Finished>,
    running: usize,
    tids: ThreadIds,
    parallelism: usize,
    dry_run: bool,
}

impl Runner {
    pub fn new(parallelism: usize, dry_run: bool) -> Self {
        let (tx, rx) = mpsc::channel();
        Runner {
            finished_send: tx,
            finished_recv: rx,
            running: 0,
            tids: ThreadIds::default(),
            parallelism: parallelism.max(1),
            dry_run,
        }
    }
}

impl Jobs for Runner {
    fn can_start_more(&self) -> bool {
        self.running < self.parallelism
    }

    fn is_running(&self) -> bool {
        self.running > 0
    }

    fn start(&mut self, id: NodeId, node: &Node) {
        let tid = self.tids.claim();
        let tx = self.finished_send.clone();
        let task = Task::from_node(node);
        let dry_run = self.dry_run;
        std::thread::spawn(move || {
            let start = Instant::now();
            let (outcome, output) = run_task(&task, dry_run)
                .unwrap_or_else(|err| (Outcome::Failed, format!("{}: {}\n", task.name, err).into_bytes()));
            let finish = Instant::now();

            let finished = Finished {
                tid,
                id,
                span: (start, finish),
                outcome,
                output,
            };
            // The send will only fail if the receiver disappeared, e.g. due to shutting down.
            let _ = tx.send(finished);
        });
        self.running += 1;
    }

    fn wait(&mut self, dur: Duration) -> Option<Finished> {
        // We hold a sender ourselves, so the channel never disconnects.
        let task = self.finished_recv.recv_timeout(dur).ok()?;
        self.tids.release(task.tid);
        self.running -= 1;
        Some(task)
    }
}
