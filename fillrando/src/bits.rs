use std::fmt;

use bitvec::prelude::*;

// Growable bitset over dense indices. Every operation returns a new value;
// a `Bits` is never modified once built.
#[derive(Clone, Default)]
pub struct Bits {
    bits: BitVec,
}

impl Bits {
    pub fn empty() -> Bits {
        Bits { bits: BitVec::new() }
    }

    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Bits {
        let mut bits = BitVec::new();
        for i in indices {
            if i >= bits.len() {
                bits.resize(i + 1, false);
            }
            bits.set(i, true);
        }
        Bits { bits }
    }

    pub fn contains(&self, i: usize) -> bool {
        self.bits.get(i).as_deref() == Some(&true)
    }

    #[must_use]
    pub fn with(&self, i: usize) -> Bits {
        let mut bits = self.bits.clone();
        if i >= bits.len() {
            bits.resize(i + 1, false);
        }
        bits.set(i, true);
        Bits { bits }
    }

    #[must_use]
    pub fn without(&self, i: usize) -> Bits {
        let mut bits = self.bits.clone();
        if i < bits.len() {
            bits.set(i, false);
        }
        Bits { bits }
    }

    #[must_use]
    pub fn union(&self, other: &Bits) -> Bits {
        let (mut bits, smaller) = if self.bits.len() >= other.bits.len() {
            (self.bits.clone(), &other.bits)
        } else {
            (other.bits.clone(), &self.bits)
        };
        for i in smaller.iter_ones() {
            bits.set(i, true);
        }
        Bits { bits }
    }

    #[must_use]
    pub fn difference(&self, other: &Bits) -> Bits {
        Bits::from_indices(self.iter().filter(|&i| !other.contains(i)))
    }

    // True if every index in `other` is also in `self`.
    pub fn contains_all(&self, other: &Bits) -> bool {
        other.bits.iter_ones().all(|i| self.contains(i))
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Bits) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Bits {}

impl FromIterator<usize> for Bits {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Bits::from_indices(iter)
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
