use std::collections::BTreeSet;
use std::fmt;

use hashbrown::HashSet;
use serde::Serialize;

pub type Atom = u32; // Shared id space for items, flags, checks, and waypoints

/// A conjunction of atoms: all of them must be held for the route to be open.
/// Atoms are kept sorted and deduplicated, so two routes over the same set compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Route(Vec<Atom>);

impl Route {
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Route {
        let mut atoms: Vec<Atom> = atoms.into_iter().collect();
        atoms.sort_unstable();
        atoms.dedup();
        Route(atoms)
    }

    pub fn empty() -> Route {
        Route(vec![])
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, atom: Atom) -> bool {
        self.0.binary_search(&atom).is_ok()
    }

    pub fn is_subset_of(&self, other: &Route) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        // Both sides are sorted, so a single merge walk suffices.
        let mut j = 0;
        for &a in &self.0 {
            while j < other.0.len() && other.0[j] < a {
                j += 1;
            }
            if j == other.0.len() || other.0[j] != a {
                return false;
            }
            j += 1;
        }
        true
    }

    pub fn union(&self, other: &Route) -> Route {
        Route::new(self.0.iter().chain(other.0.iter()).copied())
    }

    pub fn is_satisfied_by(&self, has: &HashSet<Atom>) -> bool {
        self.0.iter().all(|a| has.contains(a))
    }

    // Space-joined sorted atoms; unique per distinct route.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl FromIterator<Atom> for Route {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Self {
        Route::new(iter)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label())
    }
}

/// A disjunction of routes, in disjunctive normal form.
///
/// No routes at all means the requirement can never be met; a requirement
/// holding the empty route is always met.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Requirement {
    routes: Vec<Route>,
}

impl Requirement {
    pub fn closed() -> Requirement {
        Requirement { routes: vec![] }
    }

    pub fn open() -> Requirement {
        Requirement {
            routes: vec![Route::empty()],
        }
    }

    pub fn single(route: Route) -> Requirement {
        Requirement {
            routes: vec![route],
        }
    }

    // Builds a minimized requirement out of arbitrary routes.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Requirement {
        let mut req = MutableRequirement::default();
        for route in routes {
            req.add(route);
        }
        req.freeze()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_closed(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.routes.iter().any(|r| r.is_empty())
    }

    pub fn is_satisfied_by(&self, has: &HashSet<Atom>) -> bool {
        self.routes.iter().any(|r| r.is_satisfied_by(has))
    }

    // True if no route is a subset of another distinct route.
    pub fn is_minimal(&self) -> bool {
        for (i, r1) in self.routes.iter().enumerate() {
            for (j, r2) in self.routes.iter().enumerate() {
                if i != j && r1.is_subset_of(r2) {
                    return false;
                }
            }
        }
        true
    }

    pub fn minimized(&self) -> Requirement {
        Requirement::from_routes(self.routes.iter().cloned())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.routes.is_empty() {
            return write!(f, "never");
        }
        let parts: Vec<String> = self.routes.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

// Incremental builder for a requirement that stays minimal after every insertion.
#[derive(Clone, Debug, Default)]
pub struct MutableRequirement {
    routes: BTreeSet<Route>,
}

impl MutableRequirement {
    // Inserts `route` unless an existing route is a subset of it; any existing
    // supersets of `route` are dropped. Returns whether the route was inserted.
    pub fn add(&mut self, route: Route) -> bool {
        if self.routes.iter().any(|r| r.is_subset_of(&route)) {
            return false;
        }
        self.routes.retain(|r| !route.is_subset_of(r));
        self.routes.insert(route);
        true
    }

    pub fn remove(&mut self, route: &Route) -> bool {
        self.routes.remove(route)
    }

    pub fn contains(&self, route: &Route) -> bool {
        self.routes.contains(route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn freeze(&self) -> Requirement {
        Requirement {
            routes: self.routes.iter().cloned().collect(),
        }
    }
}

// Conjunction: one route per combination of routes drawn from each input.
// The result is deduplicated but not minimized.
pub fn and(reqs: &[Requirement]) -> Requirement {
    let mut routes: BTreeSet<Route> = BTreeSet::new();
    routes.insert(Route::empty());
    for req in reqs {
        let mut next = BTreeSet::new();
        for left in &routes {
            for right in &req.routes {
                next.insert(left.union(right));
            }
        }
        routes = next;
    }
    Requirement {
        routes: routes.into_iter().collect(),
    }
}

// Disjunction: plain union of the inputs' routes with no subset pruning,
// except that an always-met input makes the whole result always met.
pub fn or(reqs: &[Requirement]) -> Requirement {
    if reqs.iter().any(|r| r.is_open()) {
        return Requirement::open();
    }
    let routes: BTreeSet<Route> = reqs
        .iter()
        .flat_map(|r| r.routes.iter().cloned())
        .collect();
    Requirement {
        routes: routes.into_iter().collect(),
    }
}

// Both requirements must hold: cross product followed by minimization.
pub fn meet(left: &Requirement, right: &Requirement) -> Requirement {
    let mut out = MutableRequirement::default();
    for l in &left.routes {
        for r in &right.routes {
            out.add(l.union(r));
        }
    }
    out.freeze()
}
