use log::{debug, trace};

use crate::requirement::{Atom, Route};
use crate::{ItemIndex, SlotIndex};

// Receiver for fine-grained events from graph reduction and shuffling.
// Every method defaults to doing nothing, so a sink only overrides what it
// cares about.
pub trait TraceSink {
    fn route_added(&mut self, _target: Atom, _route: &Route) {}
    fn node_eliminated(&mut self, _node: Atom, _alternatives: usize, _rewritten: usize) {}
    fn attempt_started(&mut self, _attempt_num: usize) {}
    fn item_placed(&mut self, _attempt_num: usize, _slot: SlotIndex, _item: ItemIndex) {}
    fn item_evicted(&mut self, _attempt_num: usize, _slot: SlotIndex, _item: ItemIndex) {}
    fn attempt_failed(&mut self, _attempt_num: usize, _reason: &str) {}
}

#[derive(Default, Clone, Copy, Debug)]
pub struct NoTrace;

impl TraceSink for NoTrace {}

// Forwards events to the `log` facade. Route and placement events are very
// chatty, so they go out at trace level.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn route_added(&mut self, target: Atom, route: &Route) {
        trace!("route {target} <- {route}");
    }

    fn node_eliminated(&mut self, node: Atom, alternatives: usize, rewritten: usize) {
        debug!("eliminated {node}: {alternatives} alternatives, {rewritten} routes rewritten");
    }

    fn attempt_started(&mut self, attempt_num: usize) {
        trace!("[attempt {attempt_num}] start");
    }

    fn item_placed(&mut self, attempt_num: usize, slot: SlotIndex, item: ItemIndex) {
        trace!("[attempt {attempt_num}] placed item {item} in slot {slot}");
    }

    fn item_evicted(&mut self, attempt_num: usize, slot: SlotIndex, item: ItemIndex) {
        trace!("[attempt {attempt_num}] evicted item {item} from slot {slot}");
    }

    fn attempt_failed(&mut self, attempt_num: usize, reason: &str) {
        debug!("[attempt {attempt_num}] failed: {reason}");
    }
}

// Collects events in memory; handy for inspecting a run after the fact.
#[derive(Default, Clone, Debug)]
pub struct RecordingTrace {
    pub routes_added: Vec<(Atom, Route)>,
    pub eliminated: Vec<Atom>,
    pub placements: usize,
    pub evictions: usize,
    pub failures: Vec<(usize, String)>,
}

impl TraceSink for RecordingTrace {
    fn route_added(&mut self, target: Atom, route: &Route) {
        self.routes_added.push((target, route.clone()));
    }

    fn node_eliminated(&mut self, node: Atom, _alternatives: usize, _rewritten: usize) {
        self.eliminated.push(node);
    }

    fn item_placed(&mut self, _attempt_num: usize, _slot: SlotIndex, _item: ItemIndex) {
        self.placements += 1;
    }

    fn item_evicted(&mut self, _attempt_num: usize, _slot: SlotIndex, _item: ItemIndex) {
        self.evictions += 1;
    }

    fn attempt_failed(&mut self, attempt_num: usize, reason: &str) {
        self.failures.push((attempt_num, reason.to_string()));
    }
}
