use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fillrando::build_graph;
use fillrando::randomize::{ProgressControl, ProgressTracker, Randomizer, ShuffleOutcome};
use fillrando::settings::{parse_randomizer_settings, RandomizerSettings};
use fillrando::traverse::analyze_spheres;
use fillrando_game::World;
use fillrando_logic::{LogTrace, NoTrace, TraceSink};
use log::info;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    world: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    max_attempts: Option<usize>,

    #[arg(long)]
    output: Option<PathBuf>,

    // Log every route and placement event (at trace/debug level).
    #[arg(long)]
    trace: bool,
}

#[derive(Serialize)]
struct SphereRow {
    sphere: usize,
    slot: String,
    item: Option<String>,
}

#[derive(Serialize)]
struct Output {
    world: String,
    seed: usize,
    attempts: usize,
    fill: BTreeMap<String, String>,
    spheres: Vec<SphereRow>,
}

struct LogProgress {
    total: usize,
    done: usize,
}

impl ProgressTracker for LogProgress {
    fn add_tasks(&mut self, count: usize) {
        self.total += count;
    }

    fn add_completed(&mut self, count: usize) -> ProgressControl {
        self.done += count;
        info!("{}/{} attempts", self.done, self.total);
        ProgressControl::Continue
    }
}

fn load_settings(args: &Args) -> Result<RandomizerSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let settings_str = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read settings file at {}", path.display()))?;
            parse_randomizer_settings(&settings_str)
                .with_context(|| format!("Unable to parse settings file at {}", path.display()))?
        }
        None => RandomizerSettings::default(),
    };
    if let Some(max_attempts) = args.max_attempts {
        settings.attempts = max_attempts;
    }
    Ok(settings)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    let world = World::load(&args.world)?;
    let mut log_trace = LogTrace;
    let mut no_trace = NoTrace;
    let trace: &mut dyn TraceSink = if args.trace { &mut log_trace } else { &mut no_trace };

    let graph = build_graph(&world, trace)?;
    info!(
        "{}: {} slots ({} fillable), {} items",
        graph.world_name,
        graph.num_slots(),
        graph.fillable_slots().count(),
        graph.num_items()
    );

    let seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    info!("Seed: {seed}");
    let randomizer = Randomizer::new(&graph, &settings, seed);
    let mut progress = LogProgress { total: 0, done: 0 };
    let (fill, attempts) = match randomizer.shuffle_traced(Some(&mut progress), trace)? {
        ShuffleOutcome::Filled { fill, attempts } => (fill, attempts),
        ShuffleOutcome::Unsatisfiable(reason) => bail!("Randomization failed: {reason}"),
    };

    let spheres: Vec<SphereRow> = analyze_spheres(&graph, &fill)
        .into_iter()
        .map(|e| SphereRow {
            sphere: e.sphere,
            slot: graph.slot_name(e.slot).to_string(),
            item: e.item.map(|i| graph.item_name(i).to_string()),
        })
        .collect();
    for row in &spheres {
        if let Some(item) = &row.item {
            info!("sphere {}: {} -> {}", row.sphere, row.slot, item);
        }
    }
    let output = Output {
        world: graph.world_name.clone(),
        seed,
        attempts,
        fill: graph.named_fill(&fill),
        spheres,
    };
    let output_str = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, output_str)
                .with_context(|| format!("Unable to write output to {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{output_str}"),
    }
    Ok(())
}
