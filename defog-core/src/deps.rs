//! Dependency resolution over helper definitions.
//!
//! Builds the graph `a -> b` (body of helper `a` calls helper `b`) and
//! computes the transitive closure from the extraction seeds. Output is the
//! extracted set in post order (callees before callers) so the evaluator
//! sees definitions before their first use where possible; genuine cycles
//! are tolerated and merely reported, since the target language permits
//! forward references within one program unit.

use crate::ast::{Expression, NodeId};
use crate::classify::Helpers;
use crate::extract::{resolve_callee_name, Extraction};
use crate::visitor::{self, Visitor};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use std::ops::ControlFlow;

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Helpers whose definitions must ship to the evaluator, in post order.
    pub extracted: Vec<String>,
    /// Whether a non-trivial cycle was seen (self-edges are absorbed
    /// silently).
    pub had_cycle: bool,
}

impl Resolution {
    pub fn contains(&self, name: &str) -> bool {
        self.extracted.iter().any(|n| n == name)
    }
}

/// Compute the extracted set from the seeds.
pub fn resolve(helpers: &Helpers, extraction: &Extraction) -> Resolution {
    // Edge lists per helper, deterministic order
    let mut graph: IndexMap<&str, Vec<String>> = IndexMap::new();
    for def in helpers.iter() {
        let callees = collect_helper_callees(&def.def_stmt, helpers);
        graph.insert(def.name.as_str(), callees);
    }

    let mut resolution = Resolution::default();
    let mut visited: IndexSet<String> = IndexSet::new();
    let mut in_stack: IndexSet<String> = IndexSet::new();

    for seed in &extraction.seed_names {
        dfs_postorder(seed, &graph, &mut visited, &mut in_stack, &mut resolution);
    }

    if resolution.had_cycle {
        warn!("helper dependency cycle detected; emitting an arbitrary linearization");
    }
    debug!("dependency closure: {:?}", resolution.extracted);
    resolution
}

fn dfs_postorder(
    name: &str,
    graph: &IndexMap<&str, Vec<String>>,
    visited: &mut IndexSet<String>,
    in_stack: &mut IndexSet<String>,
    resolution: &mut Resolution,
) {
    if visited.contains(name) {
        return;
    }
    if in_stack.contains(name) {
        resolution.had_cycle = true;
        return;
    }

    in_stack.insert(name.to_string());

    if let Some(callees) = graph.get(name) {
        for callee in callees {
            // A self-edge is allowed and silently absorbed
            if callee == name {
                continue;
            }
            if graph.contains_key(callee.as_str()) {
                dfs_postorder(callee, graph, visited, in_stack, resolution);
            }
        }
    }

    in_stack.swap_remove(name);
    visited.insert(name.to_string());
    // Seeds with no definition were filtered upstream; only defined
    // helpers reach the extracted set.
    if graph.contains_key(name) {
        resolution.extracted.push(name.to_string());
    }
}

/// Collect the helper names called anywhere inside a helper's definition.
fn collect_helper_callees(stmt: &crate::ast::Statement, helpers: &Helpers) -> Vec<String> {
    struct Collector<'a> {
        helpers: &'a Helpers,
        found: IndexSet<String>,
    }

    impl Visitor for Collector<'_> {
        type Break = ();

        fn visit_expr_call(
            &mut self,
            _id: NodeId,
            callee: &Expression,
            args: &[Expression],
        ) -> ControlFlow<()> {
            if let Some(name) = resolve_callee_name(callee) {
                if self.helpers.contains(&name) {
                    self.found.insert(name);
                }
            }
            visitor::walk_expr_call(self, callee, args)
        }
    }

    let mut collector = Collector {
        helpers,
        found: IndexSet::new(),
    };
    let _ = collector.visit_statement(stmt);
    collector.found.into_iter().collect()
}
