use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, ensure, Context, Result};
use fillrando_game::{IndexedVec, ItemInfo, LocationList, SlotInfo};
use fillrando_logic::{Atom, ItemIndex, SlotIndex};
use hashbrown::HashSet;
use log::warn;

use crate::bits::Bits;
use crate::traverse::traverse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeadSlotReason {
    NoRoutes,       // every route was eliminated as impossible
    NeverReachable, // has routes, but none opens even with every item in hand
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadSlot {
    pub slot: SlotIndex,
    pub name: String,
    pub reason: DeadSlotReason,
}

// Dense form of a location list, frozen for shuffling.
// Slots are nodes that can be reached; items are atoms that routes depend on
// or that can be placed. Atoms that are both (events such as a defeated boss)
// are "common": they come first in both index spaces, with the same index,
// and reaching the slot grants the item of the same index.
#[derive(Clone, Debug)]
pub struct Graph {
    pub world_name: String,
    pub slot_isv: IndexedVec<Atom>,
    pub item_isv: IndexedVec<Atom>,
    pub common: usize,
    // Alternatives for each slot; a slot opens once any of its alternatives is held.
    pub requirements: Vec<Vec<Bits>>,
    // Slots with an alternative that mentions a given item.
    pub unlocks: Vec<Vec<SlotIndex>>,
    // Slots with an always-open alternative.
    pub roots: Vec<SlotIndex>,
    pub slot_infos: Vec<Option<SlotInfo>>,
    pub item_infos: Vec<Option<ItemInfo>>,
    // Items that some route depends on.
    pub progression: Bits,
    pub slot_names: Vec<String>,
    pub item_names: Vec<String>,
    pub prefill: Vec<(SlotIndex, ItemIndex)>,
}

impl Graph {
    pub fn new(ll: &LocationList) -> Result<Graph> {
        let provided: BTreeSet<Atom> = ll.requirements.keys().copied().collect();
        let required: BTreeSet<Atom> = ll
            .requirements
            .values()
            .flat_map(|req| req.routes().iter().flat_map(|r| r.atoms().iter().copied()))
            .collect();

        let mut slot_isv: IndexedVec<Atom> = IndexedVec::default();
        let mut item_isv: IndexedVec<Atom> = IndexedVec::default();
        for &atom in provided.intersection(&required) {
            if ll.slots.contains_key(&atom) {
                bail!("Slot {} is also required by other nodes", ll.name(atom));
            }
            if ll.items.contains_key(&atom) {
                bail!("Item {} also has a requirement", ll.name(atom));
            }
            slot_isv.add(&atom);
            item_isv.add(&atom);
        }
        let common = slot_isv.len();
        for &atom in provided.difference(&required) {
            slot_isv.add(&atom);
        }
        for &atom in required.difference(&provided) {
            item_isv.add(&atom);
        }
        // Items that nothing depends on go last.
        for &atom in ll.items.keys() {
            if provided.contains(&atom) {
                bail!("Item {} also has a requirement", ll.name(atom));
            }
            item_isv.add(&atom);
        }
        for &atom in ll.slots.keys() {
            if !provided.contains(&atom) {
                bail!("Slot {} has no requirement", ll.name(atom));
            }
        }

        let mut requirements: Vec<Vec<Bits>> = Vec::with_capacity(slot_isv.len());
        let mut unlocks: Vec<Vec<SlotIndex>> = vec![vec![]; item_isv.len()];
        let mut roots: Vec<SlotIndex> = vec![];
        for (slot, atom) in slot_isv.keys.iter().enumerate() {
            let req = &ll.requirements[atom];
            let mut alternatives: Vec<Bits> = vec![];
            let mut deps: BTreeSet<ItemIndex> = BTreeSet::new();
            for route in req.routes() {
                let bits = Bits::from_indices(route.atoms().iter().map(|a| item_isv.index_by_key[a]));
                deps.extend(bits.iter());
                alternatives.push(bits);
            }
            if alternatives.iter().any(|b| b.is_empty()) {
                roots.push(slot);
            }
            for item in deps {
                unlocks[item].push(slot);
            }
            requirements.push(alternatives);
        }

        let slot_infos: Vec<Option<SlotInfo>> = slot_isv
            .keys
            .iter()
            .map(|a| ll.slots.get(a).copied())
            .collect();
        let item_infos: Vec<Option<ItemInfo>> = item_isv
            .keys
            .iter()
            .map(|a| ll.items.get(a).copied())
            .collect();
        let progression = Bits::from_indices(required.iter().map(|a| item_isv.index_by_key[a]));

        let mut prefill = vec![];
        for &(slot_atom, item_atom) in &ll.prefill {
            let slot = *slot_isv
                .index_by_key
                .get(&slot_atom)
                .with_context(|| format!("Prefilled slot {} is not in the graph", ll.name(slot_atom)))?;
            let item = *item_isv
                .index_by_key
                .get(&item_atom)
                .with_context(|| format!("Prefilled item {} is not in the graph", ll.name(item_atom)))?;
            ensure!(slot_infos[slot].is_some(), "Prefilled slot {} cannot hold items", ll.name(slot_atom));
            ensure!(item_infos[item].is_some(), "Prefilled item {} has no item info", ll.name(item_atom));
            prefill.push((slot, item));
        }

        let slot_names = slot_isv.keys.iter().map(|&a| ll.name(a)).collect();
        let item_names = item_isv.keys.iter().map(|&a| ll.name(a)).collect();
        Ok(Graph {
            world_name: ll.world_name.clone(),
            slot_isv,
            item_isv,
            common,
            requirements,
            unlocks,
            roots,
            slot_infos,
            item_infos,
            progression,
            slot_names,
            item_names,
            prefill,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.slot_isv.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_isv.len()
    }

    pub fn slot_info(&self, slot: SlotIndex) -> Result<&SlotInfo> {
        match self.slot_infos.get(slot) {
            Some(Some(info)) => Ok(info),
            Some(None) => bail!("Slot {} cannot hold items", self.slot_names[slot]),
            None => bail!("Unknown slot index {slot}"),
        }
    }

    pub fn item_info(&self, item: ItemIndex) -> Result<&ItemInfo> {
        match self.item_infos.get(item) {
            Some(Some(info)) => Ok(info),
            Some(None) => bail!("Item {} cannot be placed", self.item_names[item]),
            None => bail!("Unknown item index {item}"),
        }
    }

    pub fn is_fillable(&self, slot: SlotIndex) -> bool {
        matches!(self.slot_infos.get(slot), Some(Some(_)))
    }

    pub fn is_placeable(&self, item: ItemIndex) -> bool {
        matches!(self.item_infos.get(item), Some(Some(_)))
    }

    pub fn fillable_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        (0..self.num_slots()).filter(|&s| self.is_fillable(s))
    }

    pub fn placeable_items(&self) -> impl Iterator<Item = ItemIndex> + '_ {
        (0..self.num_items()).filter(|&i| self.is_placeable(i))
    }

    pub fn slot_name(&self, slot: SlotIndex) -> &str {
        self.slot_names.get(slot).map(|s| s.as_str()).unwrap_or("?")
    }

    pub fn item_name(&self, item: ItemIndex) -> &str {
        self.item_names.get(item).map(|s| s.as_str()).unwrap_or("?")
    }

    pub fn slot_by_name(&self, name: &str) -> Option<SlotIndex> {
        self.slot_names.iter().position(|n| n == name)
    }

    pub fn item_by_name(&self, name: &str) -> Option<ItemIndex> {
        self.item_names.iter().position(|n| n == name)
    }

    // Items obtained by reaching `slot`: its own event for common slots, plus
    // whatever the fill put there.
    pub fn grants(&self, slot: SlotIndex, fill: &Fill) -> impl Iterator<Item = ItemIndex> {
        let own = if slot < self.common { Some(slot) } else { None };
        own.into_iter().chain(fill.get(slot))
    }

    // Slots that no fill can ever reach: either nothing routes to them, or none
    // of their routes opens even with every placeable item in hand.
    pub fn dead_slots(&self) -> Vec<DeadSlot> {
        let all_items = Bits::from_indices(self.placeable_items());
        let reachable = traverse(self, &Fill::new(self.num_slots()), &all_items);
        let mut out = vec![];
        for slot in 0..self.num_slots() {
            let reason = if self.requirements[slot].is_empty() {
                DeadSlotReason::NoRoutes
            } else if !reachable.contains(slot) {
                DeadSlotReason::NeverReachable
            } else {
                continue;
            };
            warn!("Dead slot {}: {:?}", self.slot_name(slot), reason);
            out.push(DeadSlot {
                slot,
                name: self.slot_name(slot).to_string(),
                reason,
            });
        }
        out
    }

    // Checks that a finished fill is one the patcher can consume: every
    // fillable slot holds exactly one item that fits, nothing else holds
    // anything, every progression item is placed, and unique items appear once.
    pub fn validate_fill(&self, fill: &Fill, preserve_unique_checks: bool) -> Result<()> {
        ensure!(fill.len() == self.num_slots(), "Fill covers {} slots, expected {}", fill.len(), self.num_slots());
        let mut placed: HashSet<ItemIndex> = HashSet::new();
        for slot in 0..self.num_slots() {
            match (self.slot_infos[slot], fill.get(slot)) {
                (Some(slot_info), Some(item)) => {
                    let item_info = self.item_info(item)?;
                    ensure!(
                        fits(&slot_info, item_info, preserve_unique_checks),
                        "Item {} does not fit in slot {}",
                        self.item_name(item),
                        self.slot_name(slot)
                    );
                    if !placed.insert(item) && item_info.unique {
                        bail!("Unique item {} placed more than once", self.item_name(item));
                    }
                }
                (Some(_), None) => bail!("Slot {} is empty", self.slot_name(slot)),
                (None, Some(item)) => bail!(
                    "Fixed slot {} holds item {}",
                    self.slot_name(slot),
                    self.item_name(item)
                ),
                (None, None) => {}
            }
        }
        for item in self.placeable_items() {
            if self.progression.contains(item) && !placed.contains(&item) {
                bail!("Progression item {} was not placed", self.item_name(item));
            }
        }
        Ok(())
    }

    pub fn named_fill(&self, fill: &Fill) -> BTreeMap<String, String> {
        fill.iter()
            .map(|(slot, item)| (self.slot_name(slot).to_string(), self.item_name(item).to_string()))
            .collect()
    }
}

// Whether `item` may be placed in `slot`. A protected losable item never goes
// into a lossy slot; with `preserve_unique_checks`, unique items only go into
// unique slots.
pub fn fits(slot: &SlotInfo, item: &ItemInfo, preserve_unique_checks: bool) -> bool {
    if preserve_unique_checks && item.unique && !slot.unique {
        return false;
    }
    !(slot.lossy && item.losable && item.prevent_loss)
}

// Assignment of items to slots for one placement attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    slots: Vec<Option<ItemIndex>>,
}

impl Fill {
    pub fn new(num_slots: usize) -> Fill {
        Fill {
            slots: vec![None; num_slots],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: SlotIndex) -> Option<ItemIndex> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn is_filled(&self, slot: SlotIndex) -> bool {
        self.get(slot).is_some()
    }

    pub fn set(&mut self, slot: SlotIndex, item: ItemIndex) -> Result<()> {
        let Some(entry) = self.slots.get_mut(slot) else {
            bail!("Slot index {slot} out of range");
        };
        if let Some(existing) = entry {
            bail!("Slot {slot} already holds item {existing}");
        }
        *entry = Some(item);
        Ok(())
    }

    // Puts `item` in `slot`, returning whatever was there before.
    pub fn replace(&mut self, slot: SlotIndex, item: ItemIndex) -> Result<Option<ItemIndex>> {
        let Some(entry) = self.slots.get_mut(slot) else {
            bail!("Slot index {slot} out of range");
        };
        Ok(entry.replace(item))
    }

    pub fn contains_item(&self, item: ItemIndex) -> bool {
        self.slots.iter().any(|s| *s == Some(item))
    }

    pub fn num_filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, ItemIndex)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.map(|i| (slot, i)))
    }
}
