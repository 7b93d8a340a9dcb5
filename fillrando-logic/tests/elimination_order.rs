use anyhow::Result;
use fillrando_logic::{Atom, DependencyGraph, Route};
use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const NUM_BASE_ATOMS: Atom = 4;
const FIRST_NODE: Atom = 10;
const NUM_VISIBLE: usize = 2;

struct SyntheticGraph {
    nodes: Vec<Atom>,
    routes: Vec<(Atom, Vec<Atom>)>,
}

fn random_graph(rng: &mut StdRng) -> SyntheticGraph {
    let num_nodes = rng.gen_range(3..=10);
    let nodes: Vec<Atom> = (0..num_nodes).map(|i| FIRST_NODE + i as Atom).collect();
    let mut universe: Vec<Atom> = (0..NUM_BASE_ATOMS).collect();
    universe.extend(nodes.iter().copied());
    let mut routes = vec![];
    for &node in &nodes {
        let num_routes = rng.gen_range(0..=3);
        for _ in 0..num_routes {
            let num_deps = rng.gen_range(0..=3);
            let deps: Vec<Atom> = (0..num_deps)
                .map(|_| universe[rng.gen_range(0..universe.len())])
                .collect();
            routes.push((node, deps));
        }
    }
    SyntheticGraph { nodes, routes }
}

// Nodes reachable from `has` by repeatedly applying any fully satisfied route.
fn least_fixpoint(routes: &[(Atom, Vec<Atom>)], has: &HashSet<Atom>) -> HashSet<Atom> {
    let mut reached: HashSet<Atom> = HashSet::new();
    loop {
        let mut changed = false;
        for (target, deps) in routes {
            if reached.contains(target) {
                continue;
            }
            if deps.iter().all(|d| has.contains(d) || reached.contains(d)) {
                reached.insert(*target);
                changed = true;
            }
        }
        if !changed {
            return reached;
        }
    }
}

fn reduce(graph: &SyntheticGraph, order: &[Atom]) -> Result<Vec<(Atom, Vec<Atom>)>> {
    let mut dg = DependencyGraph::new();
    for (target, deps) in &graph.routes {
        dg.add_route(*target, deps)?;
    }
    for &node in order {
        dg.integrate_out(node)?;
    }
    let mut out = vec![];
    for (node, req) in dg.active_nodes() {
        assert!(req.is_minimal(), "requirement for {node} is not minimal: {req}");
        for route in req.routes() {
            for &atom in route.atoms() {
                assert!(!dg.is_eliminated(atom), "route {route} for {node} mentions eliminated {atom}");
            }
            out.push((node, route.atoms().to_vec()));
        }
    }
    Ok(out)
}

fn visible_reach(routes: &[(Atom, Vec<Atom>)], visible: &[Atom], has: &HashSet<Atom>) -> Vec<Atom> {
    let reached = least_fixpoint(routes, has);
    visible.iter().copied().filter(|v| reached.contains(v)).collect()
}

#[test]
fn elimination_order_does_not_change_visible_logic() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..300 {
        let graph = random_graph(&mut rng);
        let visible: Vec<Atom> = graph.nodes[..NUM_VISIBLE].to_vec();
        let hidden: Vec<Atom> = graph.nodes[NUM_VISIBLE..].to_vec();
        let mut shuffled = hidden.clone();
        shuffled.shuffle(&mut rng);
        let mut reversed = hidden.clone();
        reversed.reverse();

        let reduced_a = reduce(&graph, &shuffled)?;
        let reduced_b = reduce(&graph, &reversed)?;

        for mask in 0..(1u32 << NUM_BASE_ATOMS) {
            let has: HashSet<Atom> = (0..NUM_BASE_ATOMS).filter(|a| mask & (1 << a) != 0).collect();
            let expected = visible_reach(&graph.routes, &visible, &has);
            assert_eq!(visible_reach(&reduced_a, &visible, &has), expected, "routes: {:?}", graph.routes);
            assert_eq!(visible_reach(&reduced_b, &visible, &has), expected, "routes: {:?}", graph.routes);
        }
    }
    Ok(())
}

#[test]
fn repeated_add_route_is_idempotent() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let graph = random_graph(&mut rng);
        let mut dg = DependencyGraph::new();
        for (target, deps) in &graph.routes {
            dg.add_route(*target, deps)?;
        }
        for (target, deps) in &graph.routes {
            let before = dg.requirement(*target);
            assert!(dg.add_route(*target, deps)?.is_empty());
            assert_eq!(dg.requirement(*target), before);
        }
        for (_, req) in dg.active_nodes() {
            assert!(req.is_minimal());
        }
    }
    Ok(())
}

#[test]
fn chain_of_waypoints_collapses_to_items() -> Result<()> {
    // start -> w1 -(a)-> w2 -(b)-> check
    let (start, w1, w2, check, a, b) = (20, 21, 22, 23, 0, 1);
    let mut dg = DependencyGraph::new();
    dg.add_route(start, &[])?;
    dg.add_route(w1, &[start])?;
    dg.add_route(w2, &[w1, a])?;
    dg.add_route(check, &[w2, b])?;
    for node in [w1, start, w2] {
        dg.integrate_out(node)?;
    }
    let req = dg.requirement(check);
    assert_eq!(req.routes(), &[Route::new([a, b])]);
    Ok(())
}
