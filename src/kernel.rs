//! `parallel_for` abstraction over a dense index range (spec.md §5).
//!
//! The contract is: `f` is invoked exactly once per index in `0..n`, and any
//! writes `f` performs go to disjoint slots — the caller guarantees
//! disjointness when it builds the kernel, same as the teacher's
//! `ElementBlockBase::{iter, par_iter}` split in `mesh/element_block.rs`,
//! which is serial without the `rayon` feature and a `rayon::prelude`
//! range-split with it.

#[cfg(not(feature = "rayon"))]
pub fn parallel_for<F>(n: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    (0..n).for_each(f);
}

#[cfg(feature = "rayon")]
pub fn parallel_for<F>(n: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    use rayon::prelude::*;
    (0..n).into_par_iter().for_each(f);
}

/// Same contract as [`parallel_for`], but collects `f`'s return value into a
/// `Vec` ordered by index. Used wherever an operator needs to build an
/// output array index-by-index (e.g. per-element quality, per-edge length).
#[cfg(not(feature = "rayon"))]
pub fn parallel_map<T, F>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T + Sync,
    T: Send,
{
    (0..n).map(f).collect()
}

#[cfg(feature = "rayon")]
pub fn parallel_map<T, F>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T + Sync,
    T: Send,
{
    use rayon::prelude::*;
    (0..n).into_par_iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parallel_for_visits_every_index_once() {
        let hits: Vec<AtomicUsize> = (0..64).map(|_| AtomicUsize::new(0)).collect();
        parallel_for(64, |i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn parallel_map_preserves_order() {
        let out = parallel_map(10, |i| i * i);
        assert_eq!(out, (0..10).map(|i| i * i).collect::<Vec<_>>());
    }
}
