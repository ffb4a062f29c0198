//! Cavity-based independent-set selection, shared by refine/coarsen/swap
//! (spec.md §4.4).
//!
//! The conflict graph is built the way the teacher's
//! `algorithms::neighbours::compute_neighbours` builds its element-to-element
//! adjacency: bucket every touched entity id by the keys that touch it (a
//! `FxHashMap`), then connect every pair of keys sharing a bucket with
//! `itertools::tuple_combinations` into a `petgraph::UnGraphMap`. Two keys
//! conflict iff their cavity domains share any entity.

use itertools::Itertools;
use petgraph::prelude::UnGraphMap;
use rustc_hash::FxHashMap;

/// The partition-ownership contract spec.md §4.4 and §5 require of a
/// distributed mesh: owners see all upward adjacency up to some dimension,
/// and a synchronization primitive broadcasts each owner's value to every
/// replica. `SinglePartition` satisfies both trivially since there is only
/// one owner of everything; no real distributed transport is implemented
/// here (out of scope, spec.md §1).
pub trait Communicator {
    /// True iff every entity's owning rank has full upward adjacency
    /// information for it. An operator must not commit a cavity that
    /// fails this check; spec.md §7 treats a failure as fatal
    /// (`AdaptError::PartitionUnsafe`).
    fn owners_have_all_upward(&self) -> bool;

    /// Broadcast the owner's value of each entity in `values` to every
    /// replica. A no-op copy under `SinglePartition`.
    fn sync_array(&self, values: &[f64]) -> Vec<f64>;

    /// Reduce a scalar across all ranks (e.g. "did any rank commit a
    /// change").
    fn allreduce_or(&self, local: bool) -> bool;
}

pub struct SinglePartition;

impl Communicator for SinglePartition {
    fn owners_have_all_upward(&self) -> bool {
        true
    }

    fn sync_array(&self, values: &[f64]) -> Vec<f64> {
        values.to_vec()
    }

    fn allreduce_or(&self, local: bool) -> bool {
        local
    }
}

/// Greedily select a conflict-free subset of `keys`, scanning in
/// descending-`priority` order and skipping any key whose cavity domain
/// overlaps an already-accepted one (spec.md §4.4's "standard scheme").
///
/// `domain_of` returns the ids of the entities a key's cavity touches (an
/// element for swap, the elements of a vertex star for coarsening, the
/// elements incident on an edge for refinement); ids need not be globally
/// unique across dimensions, only within one call.
pub fn select_independent_set<K>(
    keys: &[K],
    priority: impl Fn(&K) -> f64,
    domain_of: impl Fn(&K) -> Vec<usize>,
) -> Vec<K>
where
    K: Copy + Eq + std::hash::Hash + Ord + petgraph::graphmap::NodeTrait,
{
    let mut entity_to_keys: FxHashMap<usize, Vec<K>> = FxHashMap::default();
    for key in keys {
        for entity in domain_of(key) {
            entity_to_keys.entry(entity).or_default().push(*key);
        }
    }

    let mut conflicts: UnGraphMap<K, ()> = UnGraphMap::new();
    for key in keys {
        conflicts.add_node(*key);
    }
    for owners in entity_to_keys.values() {
        for (a, b) in owners.iter().tuple_combinations() {
            if a != b {
                conflicts.add_edge(*a, *b, ());
            }
        }
    }

    let mut order: Vec<&K> = keys.iter().collect();
    order.sort_by(|a, b| priority(b).partial_cmp(&priority(a)).unwrap());

    let mut accepted: Vec<K> = Vec::new();
    let mut taken: rustc_hash::FxHashSet<K> = rustc_hash::FxHashSet::default();
    for &key in order {
        let blocked = conflicts
            .neighbors(*key)
            .any(|nbr| taken.contains(&nbr));
        if !blocked {
            accepted.push(*key);
            taken.insert(*key);
        }
    }
    accepted
}

/// Monotone quality-acceptance gate (spec.md §4.4): a replacement commits
/// only if it does not make the touched region's worst element worse.
/// `strict` selects `>` (swap, per spec.md §4.7) vs `>=` (refine/coarsen,
/// spec.md §8's "non-strict for refine/coarsen where tie policy is
/// implementation-defined but documented" — this crate documents ties as
/// accepted for refine/coarsen).
pub fn accepts(new_min_quality: f64, old_min_quality: f64, strict: bool) -> bool {
    if strict {
        new_min_quality > old_min_quality
    } else {
        new_min_quality >= old_min_quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_keys_are_all_accepted() {
        let keys = [0usize, 1, 2];
        let accepted = select_independent_set(&keys, |_| 1.0, |&k| vec![k]);
        let mut accepted = accepted;
        accepted.sort();
        assert_eq!(accepted, vec![0, 1, 2]);
    }

    #[test]
    fn higher_priority_key_wins_a_conflict() {
        let keys = [0usize, 1];
        let priority = |k: &usize| if *k == 0 { 10.0 } else { 1.0 };
        let domain = |_: &usize| vec![42usize];
        let accepted = select_independent_set(&keys, priority, domain);
        assert_eq!(accepted, vec![0]);
    }

    #[test]
    fn three_way_conflict_accepts_exactly_one() {
        let keys = [0usize, 1, 2];
        let domain = |_: &usize| vec![7usize];
        let accepted = select_independent_set(&keys, |_| 1.0, domain);
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn accepts_respects_strictness() {
        assert!(!accepts(1.0, 1.0, true));
        assert!(accepts(1.0, 1.0, false));
        assert!(accepts(1.5, 1.0, true));
    }

    #[test]
    fn single_partition_is_trivially_safe() {
        let comm = SinglePartition;
        assert!(comm.owners_have_all_upward());
        assert!(comm.allreduce_or(false) == false);
        assert_eq!(comm.sync_array(&[1.0, 2.0]), vec![1.0, 2.0]);
    }
}
