// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod bits;
pub mod graph;
pub mod randomize;
pub mod settings;
pub mod traverse;

use anyhow::Result;
use fillrando_game::{reduce_world, World};
use fillrando_logic::TraceSink;

use crate::graph::Graph;

// Reduces a world and compiles it into dense form, ready for shuffling.
pub fn build_graph(world: &World, trace: &mut dyn TraceSink) -> Result<Graph> {
    let location_list = reduce_world(world, trace)?;
    Graph::new(&location_list)
}
