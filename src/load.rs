//! Graph loading: reads a rule file and constructs the build graph from it.
//!
//! The format is a small subset of make:
//!
//! ```text
//! # comment
//! out1 out2: in1 in2 .USE .EXEC
//! <TAB>command
//! .ORDER: first second third
//! ```

use crate::graph::{Graph, Kind, NodeId};
use anyhow::{anyhow, bail};

pub struct State {
    pub graph: Graph,
    /// The first ordinary target declared, built when none is requested.
    pub default: Option<NodeId>,
}

struct FileLoc<'a> {
    filename: &'a str,
    line: usize,
}
impl std::fmt::Display for FileLoc<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

/// An all-caps dotted word like ".USE", as opposed to a file like ".depend".
fn is_attribute(word: &str) -> bool {
    match word.strip_prefix('.') {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_uppercase() || b == b'_'),
        None => false,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

pub fn parse(filename: &str, text: &str) -> anyhow::Result<State> {
    let mut graph = Graph::new();
    let mut default = None;
    // Targets of the rule whose commands we're reading.
    let mut current: Vec<NodeId> = Vec::new();
    let mut groups = 0;

    for (i, line) in text.lines().enumerate() {
        let loc = FileLoc {
            filename,
            line: i + 1,
        };

        if let Some(cmd) = line.strip_prefix('\t') {
            let cmd = cmd.trim();
            if cmd.is_empty() {
                continue;
            }
            if current.is_empty() {
                bail!("{}: command outside of a rule", loc);
            }
            for &id in &current {
                graph.node_mut(id).commands.push(cmd.to_owned());
            }
            continue;
        }

        let line = strip_comment(line).trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let (lhs, rhs) = line
            .split_once(':')
            .ok_or_else(|| anyhow!("{}: expected \"targets: sources\"", loc))?;
        let targets: Vec<&str> = lhs.split_whitespace().collect();
        let sources: Vec<&str> = rhs.split_whitespace().collect();
        if targets.is_empty() {
            bail!("{}: rule without targets", loc);
        }

        if targets == [".ORDER"] {
            let ids: Vec<NodeId> = sources.iter().map(|s| graph.node_id(s)).collect();
            for pair in ids.windows(2) {
                graph.add_order(pair[0], pair[1]);
            }
            current.clear();
            continue;
        }
        if let Some(t) = targets.iter().find(|t| is_attribute(t)) {
            bail!("{}: unknown special target {}", loc, t);
        }

        let ids: Vec<NodeId> = targets.iter().map(|t| graph.node_id(t)).collect();
        let group = if ids.len() > 1 {
            groups += 1;
            Some(groups)
        } else {
            None
        };
        for &id in &ids {
            if group.is_some() {
                graph.node_mut(id).group = group;
            }
            for &source in &sources {
                match source {
                    ".USE" => graph.set_kind(id, Kind::UseOnly),
                    ".EXEC" => graph.set_kind(id, Kind::ExecOnly),
                    s if is_attribute(s) => bail!("{}: unknown attribute {}", loc, s),
                    s => {
                        let child = graph.node_id(s);
                        if child == id {
                            bail!("{}: {} depends on itself", loc, s);
                        }
                        graph.add_child(id, child);
                    }
                }
            }
        }
        if default.is_none() && graph.node(ids[0]).kind != Kind::UseOnly {
            default = Some(ids[0]);
        }
        current = ids;
    }

    Ok(State { graph, default })
}

pub fn read(path: &str) -> anyhow::Result<State> {
    let text = std::fs::read_to_string(path).map_err(|err| anyhow!("read {}: {}", path, err))?;
    parse(path, &text)
}
