use fillrando_logic::{ItemIndex, SlotIndex};
use serde::Serialize;

use crate::bits::Bits;
use crate::graph::{Fill, Graph};

// A slot opens once any of its alternatives is contained in `has`.
fn is_open(graph: &Graph, slot: SlotIndex, has: &Bits) -> bool {
    graph.requirements[slot].iter().any(|alt| has.contains_all(alt))
}

// Returns the set of slots reachable when starting out holding `has` and
// picking up everything the fill (and every event reached) grants along the
// way. Monotone in `has`.
pub fn traverse(graph: &Graph, fill: &Fill, has: &Bits) -> Bits {
    let mut has = has.clone();
    let mut reachable = vec![false; graph.num_slots()];
    let mut queue: Vec<SlotIndex> = graph.roots.clone();
    for item in has.iter() {
        if let Some(slots) = graph.unlocks.get(item) {
            queue.extend(slots.iter().copied());
        }
    }
    while let Some(slot) = queue.pop() {
        if reachable[slot] || !is_open(graph, slot, &has) {
            continue;
        }
        reachable[slot] = true;
        for item in graph.grants(slot, fill) {
            if has.contains(item) {
                continue;
            }
            has = has.with(item);
            queue.extend(graph.unlocks[item].iter().copied());
        }
    }
    Bits::from_indices((0..graph.num_slots()).filter(|&s| reachable[s]))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SphereEntry {
    pub sphere: usize,
    pub slot: SlotIndex,
    pub item: Option<ItemIndex>,
}

// Groups reachable slots by collection sphere: sphere 0 is what can be
// reached with nothing in hand, and sphere n+1 is what opens up after
// collecting everything in spheres 0 through n.
pub fn analyze_spheres(graph: &Graph, fill: &Fill) -> Vec<SphereEntry> {
    let mut has = Bits::empty();
    let mut visited = vec![false; graph.num_slots()];
    let mut out = vec![];
    let mut sphere = 0;
    loop {
        let opened: Vec<SlotIndex> = (0..graph.num_slots())
            .filter(|&s| !visited[s] && is_open(graph, s, &has))
            .collect();
        if opened.is_empty() {
            return out;
        }
        let mut granted: Vec<ItemIndex> = vec![];
        for &slot in &opened {
            visited[slot] = true;
            out.push(SphereEntry {
                sphere,
                slot,
                item: fill.get(slot),
            });
            granted.extend(graph.grants(slot, fill));
        }
        for item in granted {
            has = has.with(item);
        }
        sphere += 1;
    }
}
