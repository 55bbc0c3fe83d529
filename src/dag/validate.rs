// src/dag/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::browser::TaskGraphBrowser;
use crate::errors::{DispatchError, Result};

impl TaskGraphBrowser {
    /// Fail with `CycleDetected` if an event can re-trigger itself.
    ///
    /// Nodes are event names. For every binding `event -> task` there is an
    /// edge from `event` to each of the task's output events.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let mut outputs: Vec<(String, Vec<String>)> = Vec::new();
        for trigger in self.triggers() {
            for runnable in self.triggered_by(trigger) {
                outputs.push((trigger.to_string(), self.output_events_of(runnable)?));
            }
        }

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (trigger, emitted) in &outputs {
            graph.add_node(trigger.as_str());
            for output in emitted {
                graph.add_edge(trigger.as_str(), output.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DispatchError::CycleDetected(format!(
                "cycle detected in task graph involving event '{}'",
                cycle.node_id()
            ))),
        }
    }
}
