use std::fmt;

use anyhow::{ensure, Result};
use fillrando_logic::{ItemIndex, NoTrace, SlotIndex, TraceSink};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::bits::Bits;
use crate::graph::{fits, DeadSlot, Fill, Graph};
use crate::settings::RandomizerSettings;
use crate::traverse::traverse;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProgressControl {
    Continue,
    Cancel,
}

// Host hook called between attempts. It never influences the result, except
// that returning `Cancel` stops before the next attempt.
pub trait ProgressTracker {
    fn add_tasks(&mut self, count: usize);
    fn add_completed(&mut self, count: usize) -> ProgressControl;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unsatisfiable {
    DeadSlots(Vec<DeadSlot>),
    TooManyItems { items: usize, slots: usize },
    NotEnoughItems { items: usize, slots: usize },
    AttemptsExhausted { attempts: usize, last_failure: String },
    Cancelled { attempts: usize },
}

impl fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsatisfiable::DeadSlots(dead) => {
                let names: Vec<&str> = dead.iter().map(|d| d.name.as_str()).collect();
                write!(f, "unreachable slots: {}", names.join(", "))
            }
            Unsatisfiable::TooManyItems { items, slots } => {
                write!(f, "too many items: {items} items for {slots} slots")
            }
            Unsatisfiable::NotEnoughItems { items, slots } => {
                write!(f, "not enough items: {items} items for {slots} slots, and no filler")
            }
            Unsatisfiable::AttemptsExhausted {
                attempts,
                last_failure,
            } => write!(f, "no valid placement after {attempts} attempts (last: {last_failure})"),
            Unsatisfiable::Cancelled { attempts } => write!(f, "cancelled after {attempts} attempts"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShuffleOutcome {
    Filled { fill: Fill, attempts: usize },
    Unsatisfiable(Unsatisfiable),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(Fill),
    Failure(String),
}

pub struct Randomizer<'r> {
    pub graph: &'r Graph,
    pub settings: &'r RandomizerSettings,
    pub seed: usize,
    // Placeable items that routes depend on, minus prefilled ones.
    progression_items: Vec<ItemIndex>,
    // Placeable items nothing depends on, minus prefilled ones.
    filler_items: Vec<ItemIndex>,
    // Items that may be repeated to fill leftover slots.
    padding_items: Vec<ItemIndex>,
}

fn attempt_rng(seed: usize, attempt_num: usize) -> StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&(seed as u64).to_le_bytes());
    rng_seed[8..16].copy_from_slice(&(attempt_num as u64).to_le_bytes());
    StdRng::from_seed(rng_seed)
}

impl<'r> Randomizer<'r> {
    pub fn new(graph: &'r Graph, settings: &'r RandomizerSettings, seed: usize) -> Randomizer<'r> {
        let prefilled: Vec<ItemIndex> = graph.prefill.iter().map(|&(_, item)| item).collect();
        let mut progression_items = vec![];
        let mut filler_items = vec![];
        for item in graph.placeable_items() {
            if prefilled.contains(&item) {
                continue;
            }
            if graph.progression.contains(item) {
                progression_items.push(item);
            } else {
                filler_items.push(item);
            }
        }
        let non_unique = |item: &ItemIndex| graph.item_infos[*item].is_some_and(|info| !info.unique);
        let mut padding_items: Vec<ItemIndex> = graph
            .placeable_items()
            .filter(|i| !graph.progression.contains(*i))
            .filter(non_unique)
            .collect();
        if padding_items.is_empty() {
            padding_items = graph.placeable_items().filter(non_unique).collect();
        }
        Randomizer {
            graph,
            settings,
            seed,
            progression_items,
            filler_items,
            padding_items,
        }
    }

    // Problems that no amount of reshuffling can fix.
    pub fn precheck(&self) -> Option<Unsatisfiable> {
        let dead = self.graph.dead_slots();
        if !dead.is_empty() {
            return Some(Unsatisfiable::DeadSlots(dead));
        }
        let items = self.progression_items.len() + self.filler_items.len() + self.graph.prefill.len();
        let slots = self.graph.fillable_slots().count();
        if items > slots {
            return Some(Unsatisfiable::TooManyItems { items, slots });
        }
        if items < slots && self.padding_items.is_empty() {
            return Some(Unsatisfiable::NotEnoughItems { items, slots });
        }
        None
    }

    pub fn shuffle(&self, tracker: Option<&mut dyn ProgressTracker>) -> Result<ShuffleOutcome> {
        self.shuffle_traced(tracker, &mut NoTrace)
    }

    // Runs placement attempts until one succeeds, the attempt budget runs out,
    // or the tracker cancels. Each attempt draws from its own generator seeded
    // by (seed, attempt number), so the outcome does not depend on the tracker.
    pub fn shuffle_traced(
        &self,
        mut tracker: Option<&mut dyn ProgressTracker>,
        trace: &mut dyn TraceSink,
    ) -> Result<ShuffleOutcome> {
        self.settings.validate()?;
        if let Some(reason) = self.precheck() {
            warn!("{}: {reason}", self.graph.world_name);
            return Ok(ShuffleOutcome::Unsatisfiable(reason));
        }
        let attempts = self.settings.attempts;
        let interval = self.settings.progress_interval;
        if let Some(t) = tracker.as_deref_mut() {
            t.add_tasks(attempts);
        }
        let mut last_failure = String::new();
        for attempt_num in 0..attempts {
            if attempt_num > 0 && attempt_num % interval == 0 {
                if let Some(t) = tracker.as_deref_mut() {
                    if t.add_completed(interval) == ProgressControl::Cancel {
                        info!("Cancelled after {attempt_num} attempts");
                        return Ok(ShuffleOutcome::Unsatisfiable(Unsatisfiable::Cancelled {
                            attempts: attempt_num,
                        }));
                    }
                }
            }
            match self.attempt(attempt_num, trace)? {
                AttemptOutcome::Success(fill) => {
                    info!("[attempt {attempt_num}] Placed {} items", fill.num_filled());
                    return Ok(ShuffleOutcome::Filled {
                        fill,
                        attempts: attempt_num + 1,
                    });
                }
                AttemptOutcome::Failure(reason) => {
                    info!("[attempt {attempt_num}] Failed: {reason}");
                    last_failure = reason;
                }
            }
        }
        Ok(ShuffleOutcome::Unsatisfiable(Unsatisfiable::AttemptsExhausted {
            attempts,
            last_failure,
        }))
    }

    // One assumed-fill pass. Progression items are placed one at a time into
    // slots reachable while assuming every still-unplaced progression item is
    // already in hand; filler items go in afterwards.
    pub fn attempt(&self, attempt_num: usize, trace: &mut dyn TraceSink) -> Result<AttemptOutcome> {
        let graph = self.graph;
        let preserve_unique = self.settings.preserve_unique_checks;
        let mut rng = attempt_rng(self.seed, attempt_num);
        trace.attempt_started(attempt_num);

        let mut fill = Fill::new(graph.num_slots());
        let mut fixed = vec![false; graph.num_slots()];
        for &(slot, item) in &graph.prefill {
            fill.set(slot, item)?;
            fixed[slot] = true;
        }

        // Heavier items get more entries, so they tend to come up (and be placed) sooner.
        let mut pool: Vec<ItemIndex> = vec![];
        for &item in &self.progression_items {
            let weight = graph.item_info(item)?.weight.max(1);
            for _ in 0..weight {
                pool.push(item);
            }
        }
        pool.shuffle(&mut rng);
        // Items not yet placed; assumed to be in hand.
        let mut has = Bits::from_indices(self.progression_items.iter().copied());
        let mut backsteps = self.settings.backtrack_budget(attempt_num);

        while let Some(item) = pool.pop() {
            if !has.contains(item) {
                // Extra weight entry for an item that was already placed.
                continue;
            }
            has = has.without(item);
            let item_info = *graph.item_info(item)?;
            let reachable = traverse(graph, &fill, &has);
            let mut candidates: Vec<SlotIndex> = vec![];
            for slot in reachable.iter() {
                if let Some(info) = graph.slot_infos[slot] {
                    for _ in 0..info.weight.max(1) {
                        candidates.push(slot);
                    }
                }
            }
            candidates.shuffle(&mut rng);

            let mut open_slot = None;
            for &slot in &candidates {
                if !fill.is_filled(slot) && fits(graph.slot_info(slot)?, &item_info, preserve_unique) {
                    open_slot = Some(slot);
                    break;
                }
            }
            if let Some(slot) = open_slot {
                fill.set(slot, item)?;
                trace.item_placed(attempt_num, slot, item);
                continue;
            }

            if backsteps > 0 {
                let mut evict_slot = None;
                for &slot in &candidates {
                    if fill.is_filled(slot)
                        && !fixed[slot]
                        && fits(graph.slot_info(slot)?, &item_info, preserve_unique)
                    {
                        evict_slot = Some(slot);
                        break;
                    }
                }
                if let Some(slot) = evict_slot {
                    backsteps -= 1;
                    if let Some(old) = fill.replace(slot, item)? {
                        trace.item_evicted(attempt_num, slot, old);
                        has = has.with(old);
                        pool.push(old);
                    }
                    trace.item_placed(attempt_num, slot, item);
                    pool.shuffle(&mut rng);
                    continue;
                }
            }

            let reason = format!(
                "could not place {}, {} remaining",
                graph.item_name(item),
                has.count()
            );
            trace.attempt_failed(attempt_num, &reason);
            return Ok(AttemptOutcome::Failure(reason));
        }

        let reachable = traverse(graph, &fill, &Bits::empty());
        if reachable.count() < graph.num_slots() {
            let missing: Vec<&str> = (0..graph.num_slots())
                .filter(|&s| !reachable.contains(s))
                .map(|s| graph.slot_name(s))
                .collect();
            let reason = format!("unreachable slots: {}", missing.join(", "));
            trace.attempt_failed(attempt_num, &reason);
            return Ok(AttemptOutcome::Failure(reason));
        }

        if let Some(reason) = self.fill_non_progression(&mut fill, &mut rng)? {
            trace.attempt_failed(attempt_num, &reason);
            return Ok(AttemptOutcome::Failure(reason));
        }
        graph.validate_fill(&fill, preserve_unique)?;
        Ok(AttemptOutcome::Success(fill))
    }

    // Places filler items, then pads any leftover slots. Returns a failure
    // reason if something could not be placed.
    fn fill_non_progression(&self, fill: &mut Fill, rng: &mut StdRng) -> Result<Option<String>> {
        let graph = self.graph;
        let preserve_unique = self.settings.preserve_unique_checks;

        // Items: (0) uniques bound for unique slots, (1) protected losable items,
        // (2) everything else. Slots: (0) restricted, (1) unrestricted.
        let mut item_passes: [Vec<ItemIndex>; 3] = [vec![], vec![], vec![]];
        for &item in &self.filler_items {
            let info = graph.item_info(item)?;
            let pass = if preserve_unique && info.unique {
                0
            } else if info.losable && info.prevent_loss {
                1
            } else {
                2
            };
            item_passes[pass].push(item);
        }
        let mut slot_passes: [Vec<SlotIndex>; 2] = [vec![], vec![]];
        for slot in graph.fillable_slots() {
            if fill.is_filled(slot) {
                continue;
            }
            let info = graph.slot_info(slot)?;
            let pass = if info.lossy && info.prevent_loss { 0 } else { 1 };
            slot_passes[pass].push(slot);
        }
        for pass in item_passes.iter_mut() {
            pass.shuffle(rng);
        }
        for pass in slot_passes.iter_mut() {
            pass.shuffle(rng);
        }
        let num_items: usize = item_passes.iter().map(|p| p.len()).sum();
        let num_slots: usize = slot_passes.iter().map(|p| p.len()).sum();
        ensure!(num_items <= num_slots, "Too many items: {num_items} items for {num_slots} slots");

        for item in item_passes.iter().flatten().copied() {
            let item_info = graph.item_info(item)?;
            let mut found = None;
            'passes: for (pass, slots) in slot_passes.iter().enumerate() {
                for (i, &slot) in slots.iter().enumerate() {
                    if fits(graph.slot_info(slot)?, item_info, preserve_unique) {
                        found = Some((pass, i, slot));
                        break 'passes;
                    }
                }
            }
            let Some((pass, i, slot)) = found else {
                return Ok(Some(format!("could not place non-progression {}", graph.item_name(item))));
            };
            slot_passes[pass].remove(i);
            fill.set(slot, item)?;
        }

        let mut leftover: Vec<SlotIndex> = slot_passes.iter().flatten().copied().collect();
        leftover.sort();
        for slot in leftover {
            let slot_info = graph.slot_info(slot)?;
            let mut choices = vec![];
            for &item in &self.padding_items {
                if fits(slot_info, graph.item_info(item)?, preserve_unique) {
                    choices.push(item);
                }
            }
            let Some(&item) = choices.choose(rng) else {
                return Ok(Some(format!("nothing fits in slot {}", graph.slot_name(slot))));
            };
            fill.set(slot, item)?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillrando_game::{ItemInfo, LocationList, SlotInfo};
    use fillrando_logic::{RecordingTrace, Requirement, Route};

    fn two_key_world() -> Result<Graph> {
        let mut ll = LocationList::new("two keys");
        let a = ll.add_item("A", ItemInfo::default());
        let b = ll.add_item("B", ItemInfo::default());
        ll.add_slot("S0", SlotInfo::default(), Requirement::open());
        ll.add_slot("S1", SlotInfo::default(), Requirement::single(Route::new([a])));
        ll.add_slot("S2", SlotInfo::default(), Requirement::single(Route::new([b])));
        ll.add_item("Rupee", ItemInfo::default());
        Graph::new(&ll)
    }

    // S0 needs nothing, S1 needs a, S2 needs a and b.
    fn chained_world() -> Result<Graph> {
        let mut ll = LocationList::new("chained");
        let a = ll.add_item("a", ItemInfo::default());
        let b = ll.add_item("b", ItemInfo::default());
        ll.add_item("c", ItemInfo::default());
        ll.add_slot("S0", SlotInfo::default(), Requirement::open());
        ll.add_slot("S1", SlotInfo::default(), Requirement::single(Route::new([a])));
        ll.add_slot("S2", SlotInfo::default(), Requirement::single(Route::new([a, b])));
        Graph::new(&ll)
    }

    #[test]
    fn test_later_attempts_recover_by_evicting() -> Result<()> {
        let graph = chained_world()?;
        let settings = RandomizerSettings::default();
        assert_eq!(settings.backtrack_budget(0), 0);
        assert_eq!(settings.backtrack_budget(5), 1);

        let mut first_attempt_failures = 0;
        let mut evictions = 0;
        for seed in 0..200 {
            let randomizer = Randomizer::new(&graph, &settings, seed);
            if let AttemptOutcome::Failure(_) = randomizer.attempt(0, &mut NoTrace)? {
                first_attempt_failures += 1;
            }
            let mut trace = RecordingTrace::default();
            let AttemptOutcome::Success(fill) = randomizer.attempt(5, &mut trace)? else {
                panic!("seed {seed}: attempt 5 failed");
            };
            evictions += trace.evictions;
            graph.validate_fill(&fill, false)?;
            assert_eq!(traverse(&graph, &fill, &Bits::empty()).count(), graph.num_slots());
        }
        // Without a budget, b can land in S0 and leave a nowhere to go.
        assert!(first_attempt_failures > 0);
        assert!(evictions > 0);
        Ok(())
    }

    #[test]
    fn test_attempt_is_deterministic() -> Result<()> {
        let graph = two_key_world()?;
        let settings = RandomizerSettings::default();
        let randomizer = Randomizer::new(&graph, &settings, 1234);
        for attempt_num in 0..5 {
            let first = randomizer.attempt(attempt_num, &mut NoTrace)?;
            let second = randomizer.attempt(attempt_num, &mut NoTrace)?;
            assert_eq!(first, second);
        }
        Ok(())
    }

    #[test]
    fn test_item_partitions() -> Result<()> {
        let graph = two_key_world()?;
        let settings = RandomizerSettings::default();
        let randomizer = Randomizer::new(&graph, &settings, 0);
        let names = |items: &[ItemIndex]| -> Vec<String> {
            items.iter().map(|&i| graph.item_name(i).to_string()).collect()
        };
        assert_eq!(names(&randomizer.progression_items), vec!["A", "B"]);
        assert_eq!(names(&randomizer.filler_items), vec!["Rupee"]);
        assert_eq!(names(&randomizer.padding_items), vec!["Rupee"]);
        assert!(randomizer.precheck().is_none());
        Ok(())
    }

    #[test]
    fn test_too_many_items() -> Result<()> {
        let mut ll = LocationList::new("crowded");
        ll.add_slot("Only", SlotInfo::default(), Requirement::open());
        ll.add_item("X", ItemInfo::default());
        ll.add_item("Y", ItemInfo::default());
        let graph = Graph::new(&ll)?;
        let settings = RandomizerSettings::default();
        let randomizer = Randomizer::new(&graph, &settings, 0);
        assert_eq!(
            randomizer.shuffle(None)?,
            ShuffleOutcome::Unsatisfiable(Unsatisfiable::TooManyItems { items: 2, slots: 1 })
        );
        Ok(())
    }

    #[test]
    fn test_not_enough_items() -> Result<()> {
        let mut ll = LocationList::new("sparse");
        ll.add_slot("One", SlotInfo::default(), Requirement::open());
        ll.add_slot("Two", SlotInfo::default(), Requirement::open());
        ll.add_item(
            "Crown",
            ItemInfo {
                unique: true,
                ..ItemInfo::default()
            },
        );
        let graph = Graph::new(&ll)?;
        let settings = RandomizerSettings::default();
        let randomizer = Randomizer::new(&graph, &settings, 0);
        assert!(matches!(
            randomizer.precheck(),
            Some(Unsatisfiable::NotEnoughItems { items: 1, slots: 2 })
        ));
        Ok(())
    }

    #[test]
    fn test_padding_fills_leftover_slots() -> Result<()> {
        let mut ll = LocationList::new("padded");
        for name in ["One", "Two", "Three"] {
            ll.add_slot(name, SlotInfo::default(), Requirement::open());
        }
        ll.add_item("Rupee", ItemInfo::default());
        let graph = Graph::new(&ll)?;
        let settings = RandomizerSettings::default();
        let randomizer = Randomizer::new(&graph, &settings, 9);
        let ShuffleOutcome::Filled { fill, attempts } = randomizer.shuffle(None)? else {
            panic!("expected a fill");
        };
        assert_eq!(attempts, 1);
        assert_eq!(fill.num_filled(), 3);
        Ok(())
    }
}
