// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod reduce;
pub mod world;

use std::collections::BTreeMap;
use std::hash::Hash;

use anyhow::{bail, Context, Result};
use fillrando_logic::{Atom, Requirement};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

pub use reduce::reduce_world;
pub use world::{Connection, World, WorldNode};

fn default_weight() -> usize {
    1
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    // Unique items may be restricted to unique slots.
    #[serde(default)]
    pub unique: bool,
    // Losable items can be lost if they are placed in a lossy slot.
    #[serde(default)]
    pub losable: bool,
    // Losable items that must never be put at risk.
    #[serde(default)]
    pub prevent_loss: bool,
    // Number of entries in the shuffled pool; heavier items tend to be placed earlier.
    #[serde(default = "default_weight")]
    pub weight: usize,
}

impl Default for ItemInfo {
    fn default() -> Self {
        ItemInfo {
            unique: false,
            losable: false,
            prevent_loss: false,
            weight: 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    // Whether the slot may hold a unique item.
    #[serde(default)]
    pub unique: bool,
    // Whether losable items placed here are at risk.
    #[serde(default)]
    pub lossy: bool,
    #[serde(default)]
    pub prevent_loss: bool,
    // Number of entries in the candidate list when placing progression items.
    #[serde(default = "default_weight")]
    pub weight: usize,
}

impl Default for SlotInfo {
    fn default() -> Self {
        SlotInfo {
            unique: false,
            lossy: false,
            prevent_loss: false,
            weight: 1,
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// The reduced logic of a world: the requirement of every externally visible
// node in terms of items and other visible nodes, plus item and slot metadata.
// Everything is keyed by atom. Atoms are allocated by interning names, so
// every atom has a printable name.
#[derive(Default, Clone, Debug)]
pub struct LocationList {
    pub world_name: String,
    pub atom_isv: IndexedVec<String>,
    pub requirements: BTreeMap<Atom, Requirement>,
    pub items: BTreeMap<Atom, ItemInfo>,
    pub slots: BTreeMap<Atom, SlotInfo>,
    pub goal: Option<Atom>,
    pub prefill: Vec<(Atom, Atom)>, // (slot, item)
}

impl LocationList {
    pub fn new(world_name: &str) -> LocationList {
        LocationList {
            world_name: world_name.to_string(),
            ..LocationList::default()
        }
    }

    pub fn atom(&mut self, name: &str) -> Atom {
        self.atom_isv.add(name) as Atom
    }

    pub fn lookup(&self, name: &str) -> Result<Atom> {
        let idx = self
            .atom_isv
            .index_by_key
            .get(name)
            .with_context(|| format!("Unknown name: {name}"))?;
        Ok(*idx as Atom)
    }

    pub fn name(&self, atom: Atom) -> String {
        match self.atom_isv.keys.get(atom as usize) {
            Some(name) => name.clone(),
            None => format!("#{atom}"),
        }
    }

    pub fn add_item(&mut self, name: &str, info: ItemInfo) -> Atom {
        let atom = self.atom(name);
        self.items.insert(atom, info);
        atom
    }

    // A node that can be reached but holds no item (an event or the goal).
    pub fn add_node(&mut self, name: &str, req: Requirement) -> Atom {
        let atom = self.atom(name);
        self.requirements.insert(atom, req);
        atom
    }

    pub fn add_slot(&mut self, name: &str, info: SlotInfo, req: Requirement) -> Atom {
        let atom = self.add_node(name, req);
        self.slots.insert(atom, info);
        atom
    }

    pub fn add_prefill(&mut self, slot_name: &str, item_name: &str) -> Result<()> {
        let slot = self.lookup(slot_name)?;
        let item = self.lookup(item_name)?;
        if !self.slots.contains_key(&slot) {
            bail!("Prefill target {slot_name} is not a slot");
        }
        if !self.items.contains_key(&item) {
            bail!("Prefill item {item_name} is not an item");
        }
        if self.prefill.iter().any(|&(s, _)| s == slot) {
            bail!("Slot {slot_name} is prefilled more than once");
        }
        self.prefill.push((slot, item));
        Ok(())
    }

    pub fn describe(&self, req: &Requirement) -> String {
        if req.is_closed() {
            return "never".to_string();
        }
        req.routes()
            .iter()
            .map(|r| {
                let names: Vec<String> = r.atoms().iter().map(|&a| self.name(a)).collect();
                format!("({})", names.join(" & "))
            })
            .collect::<Vec<String>>()
            .join(" | ")
    }
}
