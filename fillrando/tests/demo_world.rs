use std::path::Path;
use std::process::Command;

use anyhow::Result;
use fillrando::bits::Bits;
use fillrando::build_graph;
use fillrando::randomize::{Randomizer, ShuffleOutcome};
use fillrando::settings::RandomizerSettings;
use fillrando::traverse::{analyze_spheres, traverse};
use fillrando_game::World;
use fillrando_logic::{NoTrace, RecordingTrace};
use hashbrown::HashSet;

fn load_demo() -> Result<World> {
    World::load(Path::new("../data/demo_world.json"))
}

#[test]
fn demo_world_fills_for_many_seeds() -> Result<()> {
    let world = load_demo()?;
    let graph = build_graph(&world, &mut NoTrace)?;
    let settings = RandomizerSettings::default();
    for seed in 0..25 {
        let randomizer = Randomizer::new(&graph, &settings, seed);
        let fill = match randomizer.shuffle(None)? {
            ShuffleOutcome::Filled { fill, .. } => fill,
            ShuffleOutcome::Unsatisfiable(reason) => panic!("seed {seed}: {reason}"),
        };

        // Every check holds exactly one item, and nothing else holds anything.
        for slot in 0..graph.num_slots() {
            assert_eq!(graph.is_fillable(slot), fill.get(slot).is_some());
        }
        // Unique items appear exactly once.
        let mut seen: HashSet<usize> = HashSet::new();
        for (_, item) in fill.iter() {
            if graph.item_info(item)?.unique {
                assert!(seen.insert(item), "{} placed twice", graph.item_name(item));
            }
        }
        for item in graph.placeable_items() {
            if graph.item_info(item)?.unique {
                assert!(seen.contains(&item), "{} not placed", graph.item_name(item));
            }
        }
        // The finished fill reaches everything, the goal included.
        let reachable = traverse(&graph, &fill, &Bits::empty());
        assert_eq!(reachable.count(), graph.num_slots());
        assert_eq!(fill.get(graph.slot_by_name("Dragon's Hoard").unwrap()), graph.item_by_name("Arrows"));
        graph.validate_fill(&fill, settings.preserve_unique_checks)?;

        let spheres = analyze_spheres(&graph, &fill);
        assert_eq!(spheres.len(), graph.num_slots());
        assert!(spheres.iter().all(|e| e.sphere > 0 || graph.requirements[e.slot].iter().any(|b| b.is_empty())));
    }
    Ok(())
}

#[test]
fn demo_world_trace_sees_every_placement() -> Result<()> {
    let world = load_demo()?;
    let mut trace = RecordingTrace::default();
    let graph = build_graph(&world, &mut trace)?;
    assert!(!trace.routes_added.is_empty());
    // Every location and the one trigger get integrated out.
    assert_eq!(trace.eliminated.len(), 11);

    let settings = RandomizerSettings::default();
    let mut trace = RecordingTrace::default();
    let outcome = Randomizer::new(&graph, &settings, 77).shuffle_traced(None, &mut trace)?;
    let ShuffleOutcome::Filled { attempts, .. } = outcome else {
        panic!("expected a fill");
    };
    assert_eq!(trace.failures.len(), attempts - 1);
    assert!(trace.placements >= 7);
    Ok(())
}

/// Running the CLI twice with the same seed must produce the same output.
#[test]
fn cli_consistency_test() -> Result<()> {
    let cli_path = env!("CARGO_BIN_EXE_fillrando-cli");
    let out_dir = std::env::temp_dir();
    let out1 = out_dir.join("fillrando_consistency_1.json");
    let out2 = out_dir.join("fillrando_consistency_2.json");
    let common_args = ["--world", "../data/demo_world.json", "--random-seed", "12345"];

    let status1 = Command::new(cli_path)
        .args(common_args)
        .arg("--output")
        .arg(&out1)
        .status()?;
    assert!(status1.success());
    let status2 = Command::new(cli_path)
        .args(common_args)
        .arg("--output")
        .arg(&out2)
        .status()?;
    assert!(status2.success());

    let json1: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out1)?)?;
    let json2: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out2)?)?;
    assert_eq!(json1, json2);
    assert_eq!(json1["seed"], 12345);
    assert_eq!(json1["fill"].as_object().map(|m| m.len()), Some(12));
    Ok(())
}
