// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod dependency_graph;
pub mod requirement;
pub mod trace;

pub use dependency_graph::{DependencyGraph, LabeledRoute};
pub use requirement::{and, meet, or, Atom, MutableRequirement, Requirement, Route};
pub use trace::{LogTrace, NoTrace, RecordingTrace, TraceSink};

pub type SlotIndex = usize; // Dense index of a node that can be reached (check, event, or goal)
pub type ItemIndex = usize; // Dense index of an atom that routes can depend on
