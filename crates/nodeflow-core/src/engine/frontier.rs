//! Readiness tracking for graph traversal.
//!
//! Each node keeps a count of incoming connections whose source has not
//! recorded output yet. A node runs only when that count is zero and at
//! least one producer activated it through a live connection.
//!
//! A routing node's cut connections still count as produced (the routing
//! node has output) but do not activate their target. The cut target gets
//! a `skipped` record; nothing downstream of it is touched, so a join that
//! also waits on a skipped producer never becomes ready and the run ends
//! as stalled.

use std::collections::{HashMap, HashSet, VecDeque};

use nodeflow_types::graph::{WorkflowConnection, WorkflowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// No live connection has reached the node.
    Idle,
    /// Activated, still waiting on producers.
    Waiting,
    Ready,
    Visited,
}

/// What completing a node did to its successors.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Settlement {
    /// Successors now ready to run, in activation order.
    pub ready: Vec<String>,
    /// Targets of connections the branch filter cut. Each gets a
    /// `skipped` record.
    pub skipped: Vec<String>,
}

pub(crate) struct Frontier<'g> {
    connections: Vec<&'g WorkflowConnection>,
    outgoing: HashMap<&'g str, Vec<usize>>,
    incoming: HashMap<&'g str, Vec<usize>>,
    /// Incoming connections whose source has no output yet.
    pending: HashMap<&'g str, usize>,
    states: HashMap<&'g str, NodeState>,
    queue: VecDeque<&'g str>,
    /// Node ids in graph declaration order, for stable stall reports.
    order: Vec<&'g str>,
}

impl<'g> Frontier<'g> {
    /// Build adjacency from every connection whose endpoints exist.
    pub fn new(graph: &'g WorkflowGraph) -> Self {
        let known: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        let connections: Vec<&WorkflowConnection> = graph
            .connections
            .iter()
            .filter(|c| known.contains(c.source.as_str()) && known.contains(c.target.as_str()))
            .collect();

        let mut outgoing: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, conn) in connections.iter().enumerate() {
            outgoing.entry(conn.source.as_str()).or_default().push(index);
            incoming.entry(conn.target.as_str()).or_default().push(index);
        }

        let pending = incoming.iter().map(|(id, list)| (*id, list.len())).collect();
        let states = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), NodeState::Idle))
            .collect();

        Self {
            connections,
            outgoing,
            incoming,
            pending,
            states,
            queue: VecDeque::new(),
            order: graph.nodes.iter().map(|n| n.id.as_str()).collect(),
        }
    }

    /// Next ready node, FIFO.
    pub fn pop(&mut self) -> Option<&'g str> {
        self.queue.pop_front()
    }

    pub fn is_visited(&self, node_id: &str) -> bool {
        self.states.get(node_id) == Some(&NodeState::Visited)
    }

    pub fn mark_visited(&mut self, node_id: &'g str) {
        self.states.insert(node_id, NodeState::Visited);
    }

    /// Incoming connections of a node, in declaration order.
    pub fn inputs(&self, node_id: &str) -> Vec<&'g WorkflowConnection> {
        self.incoming
            .get(node_id)
            .map(|list| list.iter().map(|&i| self.connections[i]).collect())
            .unwrap_or_default()
    }

    /// Record that a node produced output.
    ///
    /// Every outgoing connection counts as produced. `follows` decides, per
    /// connection, whether the node's branch filter keeps it live; live
    /// connections activate their target, cut ones mark it skipped.
    pub fn complete(
        &mut self,
        node_id: &str,
        follows: impl Fn(&WorkflowConnection) -> bool,
    ) -> Settlement {
        let mut settlement = Settlement::default();

        for index in self.outgoing.get(node_id).cloned().unwrap_or_default() {
            let conn = self.connections[index];
            let target = conn.target.as_str();
            if let Some(remaining) = self.pending.get_mut(target) {
                *remaining = remaining.saturating_sub(1);
            }

            if follows(conn) {
                if self.states.get(target) == Some(&NodeState::Idle) {
                    self.states.insert(target, NodeState::Waiting);
                }
            } else if !settlement.skipped.iter().any(|s| s == target) {
                settlement.skipped.push(target.to_string());
            }
        }

        // Activated targets whose producers have all recorded output.
        for index in self.outgoing.get(node_id).cloned().unwrap_or_default() {
            let target = self.connections[index].target.as_str();
            if self.states.get(target) == Some(&NodeState::Waiting)
                && self.pending.get(target).copied().unwrap_or(0) == 0
            {
                self.states.insert(target, NodeState::Ready);
                self.queue.push_back(target);
                settlement.ready.push(target.to_string());
            }
        }

        settlement
    }

    /// Nodes that were activated but still wait on producers that never
    /// recorded output: a cycle, a cut branch, or a producer the trigger
    /// cannot reach.
    pub fn stalled(&self) -> Vec<&'g str> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.states.get(*id) == Some(&NodeState::Waiting))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> WorkflowGraph {
        serde_json::from_value(value).unwrap()
    }

    fn nodes(ids: &[&str]) -> serde_json::Value {
        json!(ids.iter().map(|id| json!({"id": id, "type": "t"})).collect::<Vec<_>>())
    }

    fn conn(id: &str, source: &str, target: &str, handle: Option<&str>) -> serde_json::Value {
        json!({"id": id, "source": source, "target": target, "sourceHandle": handle})
    }

    fn true_branch(c: &WorkflowConnection) -> bool {
        c.source_handle.as_deref() == Some("true")
    }

    #[test]
    fn join_waits_for_every_producer() {
        let g = graph(json!({
            "nodes": nodes(&["t", "a", "b", "m"]),
            "connections": [
                conn("1", "t", "a", None),
                conn("2", "t", "b", None),
                conn("3", "a", "m", None),
                conn("4", "b", "m", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        f.mark_visited("t");

        let s = f.complete("t", |_| true);
        assert_eq!(s.ready, vec!["a", "b"]);

        assert_eq!(f.pop(), Some("a"));
        f.mark_visited("a");
        let s = f.complete("a", |_| true);
        assert!(s.ready.is_empty());

        assert_eq!(f.pop(), Some("b"));
        f.mark_visited("b");
        let s = f.complete("b", |_| true);
        assert_eq!(s.ready, vec!["m"]);

        let inputs: Vec<&str> = f.inputs("m").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(inputs, vec!["3", "4"]);
    }

    #[test]
    fn cut_target_is_skipped_and_its_subtree_untouched() {
        let g = graph(json!({
            "nodes": nodes(&["t", "if", "yes", "no", "after_no"]),
            "connections": [
                conn("1", "t", "if", None),
                conn("2", "if", "yes", Some("true")),
                conn("3", "if", "no", Some("false")),
                conn("4", "no", "after_no", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        f.mark_visited("t");
        f.complete("t", |_| true);
        assert_eq!(f.pop(), Some("if"));
        f.mark_visited("if");

        let s = f.complete("if", true_branch);
        assert_eq!(s.ready, vec!["yes"]);
        assert_eq!(s.skipped, vec!["no"]);
        assert!(f.stalled().is_empty());
    }

    #[test]
    fn join_behind_cut_branch_stalls() {
        let g = graph(json!({
            "nodes": nodes(&["t", "if", "yes", "no", "m"]),
            "connections": [
                conn("1", "t", "if", None),
                conn("2", "if", "yes", Some("true")),
                conn("3", "if", "no", Some("false")),
                conn("4", "yes", "m", None),
                conn("5", "no", "m", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        f.complete("t", |_| true);
        f.pop();
        f.complete("if", true_branch);
        assert_eq!(f.pop(), Some("yes"));

        let s = f.complete("yes", |_| true);
        assert!(s.ready.is_empty());
        assert_eq!(f.pop(), None);
        assert_eq!(f.stalled(), vec!["m"]);
    }

    #[test]
    fn producer_without_output_blocks_join() {
        let g = graph(json!({
            "nodes": nodes(&["t", "orphan", "m"]),
            "connections": [
                conn("1", "t", "m", None),
                conn("2", "orphan", "m", None),
                conn("3", "t", "ghost", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        let s = f.complete("t", |_| true);
        assert!(s.ready.is_empty());
        assert_eq!(f.stalled(), vec!["m"]);
    }

    #[test]
    fn cut_connection_still_counts_as_produced() {
        // `m` hears from `if` directly (cut) and through `yes` (live).
        let g = graph(json!({
            "nodes": nodes(&["t", "if", "yes", "m"]),
            "connections": [
                conn("1", "t", "if", None),
                conn("2", "if", "yes", Some("true")),
                conn("3", "if", "m", Some("false")),
                conn("4", "yes", "m", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        f.complete("t", |_| true);
        f.pop();
        let s = f.complete("if", true_branch);
        assert_eq!(s.skipped, vec!["m"]);
        f.pop();

        let s = f.complete("yes", |_| true);
        assert_eq!(s.ready, vec!["m"]);
        assert_eq!(f.inputs("m").len(), 2);
    }

    #[test]
    fn cycle_stalls() {
        let g = graph(json!({
            "nodes": nodes(&["t", "a", "b"]),
            "connections": [
                conn("1", "t", "a", None),
                conn("2", "a", "b", None),
                conn("3", "b", "a", None),
            ]
        }));
        let mut f = Frontier::new(&g);
        let s = f.complete("t", |_| true);
        assert!(s.ready.is_empty());
        assert_eq!(f.pop(), None);
        assert_eq!(f.stalled(), vec!["a"]);
    }
}
