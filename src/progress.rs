//! Build progress reporting, for the purpose of display to the user.

use crate::graph::{Node, NodeId};
use crate::task::{Finished, Outcome};
use std::io::Write;

/// Trait for build progress notifications.
pub trait Progress {
    /// Called when a node is handed to the job subsystem.
    fn task_started(&mut self, id: NodeId, node: &Node);

    /// Called when a node's job completes.
    fn task_finished(&mut self, id: NodeId, node: &Node, result: &Finished);

    /// Log a line of output, e.g. final target status.
    fn log(&mut self, msg: &str);
}

/// Prints nothing.
#[derive(Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn task_started(&mut self, _id: NodeId, _node: &Node) {}
    fn task_finished(&mut self, _id: NodeId, _node: &Node, _result: &Finished) {}
    fn log(&mut self, _msg: &str) {}
}

/// Progress implementation for a plain console, without any overprinting.
#[derive(Default)]
pub struct ConsoleProgress {
    /// Whether to print node names as they start.
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        ConsoleProgress { verbose }
    }
}

impl Progress for ConsoleProgress {
    fn task_started(&mut self, _id: NodeId, node: &Node) {
        if self.verbose {
            self.log(&format!("making {}", node.name));
        }
    }

    fn task_finished(&mut self, _id: NodeId, node: &Node, result: &Finished) {
        let mut stdout = std::io::stdout();
        // Output is only for the user's eyes; a closed stdout isn't our problem.
        let _ = stdout.write_all(&result.output);
        if result.outcome == Outcome::Failed {
            self.log(&format!("*** failed: {}", node.name));
        }
    }

    fn log(&mut self, msg: &str) {
        println!("{}", msg);
    }
}
