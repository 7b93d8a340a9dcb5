use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::{ItemInfo, SlotInfo};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Connection {
    pub to: String,
    #[serde(default)]
    pub requires: Vec<String>,
    // The reverse direction has the same requirements.
    #[serde(default)]
    pub bidirectional: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationNode {
    pub name: String,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

// A flag set by visiting a location, e.g. a switch or a cleared obstacle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerNode {
    pub name: String,
    pub at: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

// A location that holds one item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckNode {
    pub name: String,
    pub at: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(flatten)]
    pub info: SlotInfo,
}

// A boss stays visible after reduction: defeating it is an event that other
// routes can depend on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BossNode {
    pub name: String,
    pub at: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorldNode {
    Location(LocationNode),
    Trigger(TriggerNode),
    Check(CheckNode),
    Boss(BossNode),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum NodeKind {
    Location,
    Trigger,
    Check,
    Boss,
}

impl WorldNode {
    pub fn name(&self) -> &str {
        match self {
            WorldNode::Location(n) => &n.name,
            WorldNode::Trigger(n) => &n.name,
            WorldNode::Check(n) => &n.name,
            WorldNode::Boss(n) => &n.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            WorldNode::Location(_) => NodeKind::Location,
            WorldNode::Trigger(_) => NodeKind::Trigger,
            WorldNode::Check(_) => NodeKind::Check,
            WorldNode::Boss(_) => NodeKind::Boss,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(flatten)]
    pub info: ItemInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    pub name: String,
    pub start: String,
    pub goal: String,
    pub items: Vec<ItemDef>,
    pub nodes: Vec<WorldNode>,
    // check name -> item name
    #[serde(default)]
    pub prefill: BTreeMap<String, String>,
}

impl World {
    pub fn load(path: &Path) -> Result<World> {
        let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
        let json_str = std::io::read_to_string(file)
            .with_context(|| format!("unable to read {}", path.display()))?;
        World::parse(&json_str).with_context(|| format!("unable to parse {}", path.display()))
    }

    pub fn parse(json_str: &str) -> Result<World> {
        let mut des = serde_json::Deserializer::from_str(json_str);
        let world = serde_path_to_error::deserialize(&mut des)?;
        Ok(world)
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_world() -> Result<()> {
        let world = World::parse(
            r#"{
                "name": "tiny",
                "start": "Home",
                "goal": "Ogre",
                "items": [{"name": "Key", "unique": true, "weight": 2}],
                "nodes": [
                    {"kind": "Location", "name": "Home", "connections": [{"to": "Yard", "requires": ["Key"]}]},
                    {"kind": "Location", "name": "Yard"},
                    {"kind": "Check", "name": "Yard Chest", "at": "Yard", "lossy": true},
                    {"kind": "Boss", "name": "Ogre", "at": "Yard"}
                ]
            }"#,
        )?;
        assert_eq!(world.items[0].info.weight, 2);
        assert!(world.items[0].info.unique);
        assert_eq!(world.count(NodeKind::Location), 2);
        match &world.nodes[2] {
            WorldNode::Check(c) => {
                assert!(c.info.lossy);
                assert_eq!(c.info.weight, 1);
            }
            other => panic!("unexpected node {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_parse_error_names_path() {
        let err = World::parse(r#"{"name": "x", "start": "a", "goal": "b", "items": [], "nodes": [{"kind": "Cave"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("nodes"), "{err}");
    }
}
