//! Upward adjacency (CSR) built from downward connectivity (spec.md §3).
//!
//! Built the way the teacher's `algorithms::neighbours::compute_neighbours`
//! discovers subentities: hash each entity's subentity vertex sets by a
//! sorted key, then walk the hash map to assign ids and accumulate the
//! upward edges. The teacher's own `topology/symmetry.rs` sketches (but
//! never finishes) a small permutation table for canonicalizing subentity
//! orientation; the `rotation` field below is that same idea, completed
//! just far enough to round-trip a low entity's stored vertex order
//! against the order it appears in inside a high entity.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::dimension::Dimension;

/// Local vertex index lists for each subentity of `high` at dimension
/// `low`, in canonical (opposite-vertex, ascending) order. `which_down` is
/// the position of a subentity in this list.
pub fn down_template(high: Dimension, low: Dimension) -> Vec<Vec<usize>> {
    use Dimension::*;
    match (high, low) {
        (Edge, Vert) => vec![vec![0], vec![1]],
        (Tri, Vert) => vec![vec![0], vec![1], vec![2]],
        (Tri, Edge) => vec![vec![1, 2], vec![0, 2], vec![0, 1]],
        (Tet, Vert) => vec![vec![0], vec![1], vec![2], vec![3]],
        (Tet, Edge) => vec![
            vec![0, 1],
            vec![0, 2],
            vec![0, 3],
            vec![1, 2],
            vec![1, 3],
            vec![2, 3],
        ],
        (Tet, Tri) => vec![
            vec![1, 2, 3],
            vec![0, 2, 3],
            vec![0, 1, 3],
            vec![0, 1, 2],
        ],
        _ if high == low => (0..high.nverts()).map(|i| vec![i]).collect(),
        _ => panic!("no downward template from {high:?} to {low:?}"),
    }
}

/// Compressed sparse row upward adjacency from a `low`-dimension entity to
/// the `high`-dimension entities that contain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csr {
    /// `a2ab[i]..a2ab[i+1]` indexes into `ab2b`/`codes` for low-entity `i`.
    pub a2ab: Vec<usize>,
    pub ab2b: Vec<usize>,
    /// low 3 bits: `which_down` (subentity slot index within the high
    /// entity, `0..down_template(high, low).len()`); remaining bits: a
    /// permutation index over the low entity's own vertex order, see
    /// [`rotation_for`].
    pub codes: Vec<u8>,
}

impl Csr {
    pub fn degree(&self, low: usize) -> usize {
        self.a2ab[low + 1] - self.a2ab[low]
    }

    pub fn adjacent(&self, low: usize) -> &[usize] {
        &self.ab2b[self.a2ab[low]..self.a2ab[low + 1]]
    }

    pub fn codes_of(&self, low: usize) -> &[u8] {
        &self.codes[self.a2ab[low]..self.a2ab[low + 1]]
    }
}

pub fn which_down(code: u8) -> u8 {
    code & 0b0000_0111
}

pub fn rotation(code: u8) -> u8 {
    code >> 3
}

fn pack_code(which: usize, rot: usize) -> u8 {
    debug_assert!(which < 8, "which_down must fit in 3 bits");
    (which as u8) | ((rot as u8) << 3)
}

/// Index of the permutation that maps `canonical` (the low entity's own
/// stored vertex tuple) onto `appears_as` (the order it appears inside a
/// high entity's template slot). Brute-forced over all permutations of the
/// tuple's length, which is at most 3 (triangle faces of a tet) here.
fn rotation_for(canonical: &[usize], appears_as: &[usize]) -> usize {
    let n = canonical.len();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut index = 0;
    loop {
        if perm.iter().map(|&i| canonical[i]).eq(appears_as.iter().copied()) {
            return index;
        }
        if !next_permutation(&mut perm) {
            panic!("appears_as is not a permutation of canonical");
        }
        index += 1;
    }
}

fn next_permutation(a: &mut [usize]) -> bool {
    let n = a.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && a[i - 1] >= a[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = n - 1;
    while a[j] <= a[i - 1] {
        j -= 1;
    }
    a.swap(i - 1, j);
    a[i..].reverse();
    true
}

/// Build the upward adjacency from `low` to `high`, given `high`'s
/// downward connectivity (flat, `nents_high * high.nverts()`) and the
/// already-known `verts_of_low` (flat, `nents_low * low.nverts()`, each
/// entity's tuple stored in ascending vertex-id order).
pub fn build_upward(
    high: Dimension,
    low: Dimension,
    verts_of_high: &[usize],
    nents_high: usize,
    verts_of_low: &[usize],
    nents_low: usize,
) -> Csr {
    let low_n = low.nverts();
    let mut low_key_to_id: FxHashMap<SmallVec<[usize; 4]>, usize> = FxHashMap::default();
    for i in 0..nents_low {
        let key: SmallVec<[usize; 4]> = verts_of_low[i * low_n..(i + 1) * low_n].into();
        low_key_to_id.insert(key, i);
    }

    let templates = down_template(high, low);
    let high_n = high.nverts();
    let mut per_low: Vec<Vec<(usize, u8)>> = vec![Vec::new(); nents_low];

    for h in 0..nents_high {
        let verts = &verts_of_high[h * high_n..(h + 1) * high_n];
        for (which, template) in templates.iter().enumerate() {
            let appears_as: SmallVec<[usize; 4]> = template.iter().map(|&li| verts[li]).collect();
            let mut sorted = appears_as.clone();
            sorted.sort_unstable();
            let low_id = *low_key_to_id
                .get(&sorted)
                .unwrap_or_else(|| panic!("subentity {sorted:?} of high entity {h} not found among low-dimension entities"));
            let rot = rotation_for(&sorted, &appears_as);
            per_low[low_id].push((h, pack_code(which, rot)));
        }
    }

    let mut a2ab = Vec::with_capacity(nents_low + 1);
    let mut ab2b = Vec::new();
    let mut codes = Vec::new();
    a2ab.push(0);
    for bucket in &per_low {
        for &(h, code) in bucket {
            ab2b.push(h);
            codes.push(code);
        }
        a2ab.push(ab2b.len());
    }

    Csr { a2ab, ab2b, codes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triangle_edges_see_one_triangle_each() {
        // one triangle (0,1,2); edges stored sorted: (0,1),(0,2),(1,2)
        let verts_of_tri = vec![0, 1, 2];
        let verts_of_edge = vec![0, 1, 0, 2, 1, 2];
        let csr = build_upward(Dimension::Tri, Dimension::Edge, &verts_of_tri, 1, &verts_of_edge, 3);
        for e in 0..3 {
            assert_eq!(csr.degree(e), 1);
            assert_eq!(csr.adjacent(e), &[0]);
        }
    }

    #[test]
    fn shared_edge_between_two_triangles_has_degree_two() {
        // triangles (0,1,2) and (1,2,3) share edge (1,2)
        let verts_of_tri = vec![0, 1, 2, 1, 2, 3];
        let verts_of_edge = vec![0, 1, 0, 2, 1, 2, 1, 3, 2, 3];
        let csr = build_upward(Dimension::Tri, Dimension::Edge, &verts_of_tri, 2, &verts_of_edge, 5);
        let shared = verts_of_edge
            .chunks(2)
            .position(|e| e == [1, 2])
            .unwrap();
        assert_eq!(csr.degree(shared), 2);
        let mut adj = csr.adjacent(shared).to_vec();
        adj.sort_unstable();
        assert_eq!(adj, vec![0, 1]);
    }

    #[test]
    fn code_round_trips_which_down_and_rotation() {
        let code = pack_code(5, 3);
        assert_eq!(which_down(code), 5);
        assert_eq!(rotation(code), 3);
    }

    #[test]
    fn rotation_for_identity_is_zero() {
        assert_eq!(rotation_for(&[0, 1, 2], &[0, 1, 2]), 0);
    }

    #[test]
    fn rotation_for_swap_is_nonzero() {
        assert_ne!(rotation_for(&[0, 1, 2], &[1, 0, 2]), 0);
    }
}
