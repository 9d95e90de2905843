//! Fixed-size set of site indices backed by a single `u64`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Set of site indices in `[0, 64)`.
///
/// Copying is a single word, so every search branch gets its own set without
/// any aliasing between siblings.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SiteSet(u64);

impl SiteSet {
    /// Number of distinct indices a set can hold.
    pub const CAPACITY: usize = 64;

    pub const fn empty() -> Self {
        SiteSet(0)
    }

    /// All delivery sites of an instance with `dimension` labels, i.e. `1..dimension`.
    pub fn all_sites(dimension: usize) -> Self {
        debug_assert!(dimension <= Self::CAPACITY);
        let mut set = Self::empty();
        for i in 1..dimension {
            set.insert(i);
        }
        set
    }

    #[inline]
    pub fn contains(self, site: usize) -> bool {
        site < Self::CAPACITY && self.0 & (1u64 << site) != 0
    }

    #[inline]
    pub fn insert(&mut self, site: usize) {
        debug_assert!(site < Self::CAPACITY);
        self.0 |= 1u64 << site;
    }

    #[inline]
    pub fn with(self, site: usize) -> Self {
        let mut set = self;
        set.insert(site);
        set
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        SiteSet(self.0 | other.0)
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every index of `other` is also in `self`.
    #[inline]
    pub fn is_superset(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let site = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(site)
        })
    }
}

impl FromIterator<usize> for SiteSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = SiteSet::empty();
        for site in iter {
            set.insert(site);
        }
        set
    }
}

impl fmt::Debug for SiteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
