//! Hash collections used across the compiler.
//!
//! FxHash is used everywhere: keys are compiler-internal handles, so DoS
//! resistance is irrelevant and speed matters.

use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub use rustc_hash::{FxHashMap, FxHashSet};

pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Insertion-ordered map. Member tables and scope bindings use it so that
/// diagnostics and emitted records come out in declaration order.
pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered set.
pub type FxIndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_map_preserves_order() {
        let mut map: FxIndexMap<&str, i32> = FxIndexMap::default();
        map.insert("c", 3);
        map.insert("a", 1);
        map.insert("b", 2);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
