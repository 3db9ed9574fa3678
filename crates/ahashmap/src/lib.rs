//! Hash collections keyed with `ahash`, the workspace-wide default hasher.

pub use std::collections::{hash_map, hash_set};

#[cfg(feature = "ahash")]
pub type ARandomState = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub type ARandomState = std::collections::hash_map::RandomState;

pub type AHashMap<K, V> = std::collections::HashMap<K, V, ARandomState>;
pub type AHashSet<T> = std::collections::HashSet<T, ARandomState>;

/// Random state used when a map is built with an explicit capacity.
pub fn random_state() -> ARandomState {
    ARandomState::default()
}
