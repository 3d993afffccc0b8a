//! Named pools of substitution candidates.

use std::collections::BTreeMap;

use rand::{Rng, seq::IndexedRandom};

/// Named lists of candidate substitution strings.
///
/// Loaded once at startup, read-only afterward. Unknown or empty pools are
/// not errors: lookups against them return `None` and the caller leaves the
/// placeholder untouched. Pools iterate in name order so a fixed seed
/// reproduces a run exactly.
#[derive(Debug, Clone, Default)]
pub struct IdPool {
    pools: BTreeMap<String, Vec<String>>,
}

impl IdPool {
    /// Build a pool set from name and candidate-list pairs.
    pub fn new<I>(pools: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        Self {
            pools: pools.into_iter().collect(),
        }
    }

    /// Draw one candidate uniformly from the named pool.
    ///
    /// Returns `None` when the pool is unknown or empty. Every call
    /// re-draws: two placeholders for the same name in one message may
    /// substitute to different values.
    pub fn pick_random<R>(&self, rng: &mut R, name: &str) -> Option<&str>
    where
        R: Rng + ?Sized,
    {
        self.pools.get(name)?.choose(rng).map(String::as_str)
    }

    /// Pool names, in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// Name and candidate-count pairs, for startup reporting.
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.pools.iter().map(|(name, list)| (name.as_str(), list.len()))
    }
}
