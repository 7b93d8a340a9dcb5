use anyhow::{bail, ensure, Context, Result};
use fillrando_logic::{Atom, DependencyGraph, TraceSink};
use hashbrown::HashMap;
use log::{debug, info};
use strum::IntoEnumIterator;

use crate::world::{BossNode, CheckNode, LocationNode, NodeKind, TriggerNode, World, WorldNode};
use crate::LocationList;

struct Builder<'a> {
    ll: LocationList,
    kinds: HashMap<Atom, NodeKind>,
    graph: DependencyGraph,
    trace: &'a mut dyn TraceSink,
}

impl<'a> Builder<'a> {
    fn resolve(&self, name: &str) -> Result<Atom> {
        let atom = self.ll.lookup(name)?;
        if self.kinds.get(&atom) == Some(&NodeKind::Check) {
            bail!("Requirement on check {name} is not supported");
        }
        Ok(atom)
    }

    fn resolve_location(&self, name: &str) -> Result<Atom> {
        let atom = self.ll.lookup(name)?;
        if self.kinds.get(&atom) != Some(&NodeKind::Location) {
            bail!("{name} is not a location");
        }
        Ok(atom)
    }

    fn add_route(&mut self, target: Atom, mut deps: Vec<Atom>, requires: &[String]) -> Result<()> {
        for name in requires {
            deps.push(self.resolve(name)?);
        }
        self.graph.add_route_traced(target, &deps, self.trace)?;
        Ok(())
    }

    fn add_location(&mut self, node: &LocationNode) -> Result<()> {
        let from = self.ll.lookup(&node.name)?;
        for conn in &node.connections {
            let to = self
                .resolve_location(&conn.to)
                .with_context(|| format!("Connection from {}", node.name))?;
            self.add_route(to, vec![from], &conn.requires)?;
            if conn.bidirectional {
                self.add_route(from, vec![to], &conn.requires)?;
            }
        }
        Ok(())
    }

    fn add_trigger(&mut self, node: &TriggerNode) -> Result<()> {
        let atom = self.ll.lookup(&node.name)?;
        let at = self.resolve_location(&node.at)?;
        self.add_route(atom, vec![at], &node.requires)
    }

    fn add_check(&mut self, node: &CheckNode) -> Result<()> {
        let atom = self.ll.lookup(&node.name)?;
        let at = self.resolve_location(&node.at)?;
        self.ll.slots.insert(atom, node.info);
        self.add_route(atom, vec![at], &node.requires)
    }

    fn add_boss(&mut self, node: &BossNode) -> Result<()> {
        let atom = self.ll.lookup(&node.name)?;
        let at = self.resolve_location(&node.at)?;
        self.add_route(atom, vec![at], &node.requires)
    }

    // Repeatedly retires the cheapest remaining node: the one whose
    // substitution multiplies the fewest routes.
    fn eliminate(&mut self, mut remaining: Vec<Atom>) -> Result<()> {
        while !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_key = (usize::MAX, Atom::MAX);
            for (i, &atom) in remaining.iter().enumerate() {
                let cost = self.graph.route_count(atom) * (self.graph.fan_in(atom) + 1);
                if (cost, atom) < best_key {
                    best_key = (cost, atom);
                    best_idx = i;
                }
            }
            let atom = remaining.swap_remove(best_idx);
            self.graph.integrate_out_traced(atom, self.trace)?;
        }
        Ok(())
    }
}

// Translates a world into routes, then integrates out every location and
// trigger, leaving requirements for checks, bosses, and the goal in terms of
// items and bosses.
pub fn reduce_world(world: &World, trace: &mut dyn TraceSink) -> Result<LocationList> {
    let mut b = Builder {
        ll: LocationList::new(&world.name),
        kinds: HashMap::new(),
        graph: DependencyGraph::new(),
        trace,
    };
    for item in &world.items {
        ensure!(
            !b.ll.atom_isv.index_by_key.contains_key(&item.name),
            "Duplicate name: {}",
            item.name
        );
        ensure!(item.info.weight > 0, "Item {} has zero weight", item.name);
        b.ll.add_item(&item.name, item.info);
    }
    for node in &world.nodes {
        ensure!(
            !b.ll.atom_isv.index_by_key.contains_key(node.name()),
            "Duplicate name: {}",
            node.name()
        );
        let atom = b.ll.atom(node.name());
        b.kinds.insert(atom, node.kind());
    }
    for kind in NodeKind::iter() {
        debug!("{}: {} {kind} nodes", world.name, world.count(kind));
    }

    let start = b
        .resolve_location(&world.start)
        .context("Invalid start location")?;
    let goal = b.ll.lookup(&world.goal).context("Invalid goal")?;
    ensure!(b.kinds.contains_key(&goal), "Goal {} is not a node", world.goal);
    b.ll.goal = Some(goal);

    b.graph.add_route_traced(start, &[], b.trace)?;
    for node in &world.nodes {
        let result = match node {
            WorldNode::Location(n) => b.add_location(n),
            WorldNode::Trigger(n) => b.add_trigger(n),
            WorldNode::Check(n) => b.add_check(n),
            WorldNode::Boss(n) => b.add_boss(n),
        };
        result.with_context(|| format!("Processing {} {}", node.kind(), node.name()))?;
    }
    let num_routes = b.graph.active_route_count();

    // Triggers are pure waypoints with few routes each, so they go first.
    let nodes_of = |kind: NodeKind| -> Vec<Atom> {
        let mut out: Vec<Atom> = b
            .kinds
            .iter()
            .filter(|&(&atom, &k)| k == kind && atom != goal)
            .map(|(&atom, _)| atom)
            .collect();
        out.sort();
        out
    };
    let triggers = nodes_of(NodeKind::Trigger);
    let locations = nodes_of(NodeKind::Location);
    b.eliminate(triggers)?;
    b.eliminate(locations)?;

    let mut visible: Vec<Atom> = b
        .kinds
        .iter()
        .filter(|&(_, &k)| k == NodeKind::Check || k == NodeKind::Boss)
        .map(|(&atom, _)| atom)
        .collect();
    visible.push(goal);
    for atom in visible {
        let req = b.graph.requirement(atom);
        b.ll.requirements.insert(atom, req);
    }
    for (slot, item) in &world.prefill {
        b.ll.add_prefill(slot, item)?;
    }
    info!(
        "Reduced world {}: {} routes before elimination, {} requirements with {} routes after",
        world.name,
        num_routes,
        b.ll.requirements.len(),
        b.ll.requirements.values().map(|r| r.len()).sum::<usize>()
    );
    Ok(b.ll)
}
