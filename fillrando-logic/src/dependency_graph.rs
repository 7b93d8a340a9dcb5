use std::collections::BTreeMap;

use anyhow::{bail, Result};
use hashbrown::HashSet;

use crate::requirement::{Atom, MutableRequirement, Requirement, Route};
use crate::trace::{NoTrace, TraceSink};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabeledRoute {
    pub target: Atom,
    pub route: Route,
    pub label: String, // "target:atom atom ..."
}

impl LabeledRoute {
    fn new(target: Atom, route: Route) -> LabeledRoute {
        let label = format!("{}:{}", target, route.label());
        LabeledRoute {
            target,
            route,
            label,
        }
    }
}

// Routes per node, with state elimination.
// Nodes come into existence the first time they are the target of a route.
// An atom that has never been a target behaves as a node with no routes.
// Once a node is integrated out, routes may no longer target it, and any
// route mentioning it is rewritten in terms of its alternatives.
#[derive(Default, Clone, Debug)]
pub struct DependencyGraph {
    nodes: BTreeMap<Atom, MutableRequirement>,
    eliminated: HashSet<Atom>,
}

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        DependencyGraph::default()
    }

    pub fn add_route(&mut self, target: Atom, deps: &[Atom]) -> Result<Vec<LabeledRoute>> {
        self.add_route_traced(target, deps, &mut NoTrace)
    }

    // Adds a route to `target`, first expanding any eliminated atoms in `deps`
    // against their alternatives. Returns the routes that ended up in the
    // target's requirement (empty if everything was redundant or impossible).
    pub fn add_route_traced(
        &mut self,
        target: Atom,
        deps: &[Atom],
        trace: &mut dyn TraceSink,
    ) -> Result<Vec<LabeledRoute>> {
        if self.eliminated.contains(&target) {
            bail!("Attempted to add a route to node {target}, which has already been integrated out");
        }
        let mut accepted: Vec<LabeledRoute> = vec![];
        // Each entry is a candidate dependency list still to be expanded. A node
        // with several alternatives forks the candidate into one entry per
        // alternative.
        let mut stack: Vec<Vec<Atom>> = vec![deps.to_vec()];
        'candidates: while let Some(mut candidate) = stack.pop() {
            loop {
                // A route through the target itself is never the first way in.
                if candidate.contains(&target) {
                    continue 'candidates;
                }
                let Some(pos) = candidate.iter().position(|a| self.eliminated.contains(a)) else {
                    break;
                };
                let dep = candidate.swap_remove(pos);
                let alternatives: Vec<Route> = match self.nodes.get(&dep) {
                    Some(req) => req.routes().cloned().collect(),
                    None => vec![],
                };
                match alternatives.len() {
                    0 => continue 'candidates,
                    1 => candidate.extend_from_slice(alternatives[0].atoms()),
                    _ => {
                        for alt in alternatives.iter().rev() {
                            let mut next = candidate.clone();
                            next.extend_from_slice(alt.atoms());
                            stack.push(next);
                        }
                        continue 'candidates;
                    }
                }
            }
            let route = Route::new(candidate);
            let req = self.nodes.entry(target).or_default();
            if req.add(route.clone()) {
                trace.route_added(target, &route);
                accepted.push(LabeledRoute::new(target, route));
            }
        }
        // A later alternative may have dominated one accepted earlier.
        if let Some(req) = self.nodes.get(&target) {
            accepted.retain(|r| req.contains(&r.route));
        }
        Ok(accepted)
    }

    pub fn integrate_out(&mut self, node: Atom) -> Result<()> {
        self.integrate_out_traced(node, &mut NoTrace)
    }

    // Retires `node`: no further routes may target it, and every route
    // mentioning it (including routes of already-eliminated nodes) is replaced
    // by its substitution against the node's current alternatives.
    pub fn integrate_out_traced(&mut self, node: Atom, trace: &mut dyn TraceSink) -> Result<()> {
        if self.eliminated.contains(&node) {
            return Ok(());
        }
        let alternatives = self.nodes.get(&node).map(|r| r.len()).unwrap_or(0);
        self.eliminated.insert(node);

        let mut affected: Vec<(Atom, Route)> = vec![];
        for (&target, req) in &self.nodes {
            for route in req.routes() {
                if route.contains(node) {
                    affected.push((target, route.clone()));
                }
            }
        }

        for (target, route) in &affected {
            let Some(req) = self.nodes.get_mut(target) else {
                continue;
            };
            if !req.remove(route) {
                // Already dominated by a rewritten sibling.
                continue;
            }
            let was_eliminated = self.eliminated.remove(target);
            let result = self.add_route_traced(*target, route.atoms(), trace);
            if was_eliminated {
                self.eliminated.insert(*target);
            }
            result?;
        }
        trace.node_eliminated(node, alternatives, affected.len());
        Ok(())
    }

    pub fn is_eliminated(&self, node: Atom) -> bool {
        self.eliminated.contains(&node)
    }

    pub fn requirement(&self, node: Atom) -> Requirement {
        match self.nodes.get(&node) {
            Some(req) => req.freeze(),
            None => Requirement::closed(),
        }
    }

    pub fn route_count(&self, node: Atom) -> usize {
        self.nodes.get(&node).map(|r| r.len()).unwrap_or(0)
    }

    // Number of routes (across all nodes) that mention `atom`.
    pub fn fan_in(&self, atom: Atom) -> usize {
        self.nodes
            .values()
            .map(|req| req.routes().filter(|r| r.contains(atom)).count())
            .sum()
    }

    // Every node that has ever been a route target, eliminated or not.
    pub fn targets(&self) -> impl Iterator<Item = Atom> + '_ {
        self.nodes.keys().copied()
    }

    pub fn active_nodes(&self) -> impl Iterator<Item = (Atom, Requirement)> + '_ {
        self.nodes
            .iter()
            .filter(|(node, _)| !self.eliminated.contains(*node))
            .map(|(&node, req)| (node, req.freeze()))
    }

    // Total number of routes held by non-eliminated nodes.
    pub fn active_route_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|(node, _)| !self.eliminated.contains(*node))
            .map(|(_, req)| req.len())
            .sum()
    }
}
