//! Small regression meshes for the adaptation tests (spec.md §8), built
//! the way the teacher's own `mesh_examples.rs` builds its test fixtures:
//! plain constructors, no builder abstraction, one function per scenario.

use crate::mesh::{Dimension, Mesh, Tag, TagData, TransferPolicy};

fn add_isotropic_metric(mesh: &mut Mesh, value: f64) {
    let nverts = mesh.nents(Dimension::Vert);
    let ncomps = if mesh.space_dim() == 2 { 3 } else { 6 };
    let mut data = Vec::with_capacity(nverts * ncomps);
    for _ in 0..nverts {
        if ncomps == 3 {
            data.extend_from_slice(&[value, 0.0, value]);
        } else {
            data.extend_from_slice(&[value, 0.0, 0.0, value, 0.0, value]);
        }
    }
    let tag = Tag::new(TagData::F64(data), ncomps, TransferPolicy::Metric, true).unwrap();
    mesh.add_tag(Dimension::Vert, crate::mesh::METRIC_TAG, tag).unwrap();
}

fn add_anisotropic_metric_2d(mesh: &mut Mesh, mxx: f64, myy: f64) {
    let nverts = mesh.nents(Dimension::Vert);
    let mut data = Vec::with_capacity(nverts * 3);
    for _ in 0..nverts {
        data.extend_from_slice(&[mxx, 0.0, myy]);
    }
    let tag = Tag::new(TagData::F64(data), 3, TransferPolicy::Metric, true).unwrap();
    mesh.add_tag(Dimension::Vert, crate::mesh::METRIC_TAG, tag).unwrap();
}

/// A unit square, two triangles split along the diagonal `(0,2)`, with an
/// isotropic unit metric at every vertex (spec.md §8 scenario 1).
pub fn unit_square_isotropic() -> Mesh {
    let coords = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let mut mesh = Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2, 0, 2, 3]).unwrap();
    add_isotropic_metric(&mut mesh, 1.0);
    mesh
}

/// The same square, with a metric `diag(sx, sy)` at every vertex (spec.md
/// §8 scenario 2 uses `sx=100, sy=1`).
pub fn unit_square_anisotropic(sx: f64, sy: f64) -> Mesh {
    let coords = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let mut mesh = Mesh::new(Dimension::Tri, 2, coords, vec![0, 1, 2, 0, 2, 3]).unwrap();
    add_anisotropic_metric_2d(&mut mesh, sx, sy);
    mesh
}

/// A structured `n x n` grid of unit squares, each split into 2 triangles,
/// with an isotropic metric of the given value at every vertex.
pub fn grid_isotropic(n: usize, metric_value: f64) -> Mesh {
    let nv = n + 1;
    let mut coords = Vec::with_capacity(nv * nv * 2);
    for j in 0..nv {
        for i in 0..nv {
            coords.push(i as f64 / n as f64);
            coords.push(j as f64 / n as f64);
        }
    }
    let mut tris = Vec::new();
    let id = |i: usize, j: usize| j * nv + i;
    for j in 0..n {
        for i in 0..n {
            let (a, b, c, d) = (id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1));
            tris.extend_from_slice(&[a, b, c]);
            tris.extend_from_slice(&[a, c, d]);
        }
    }
    let mut mesh = Mesh::new(Dimension::Tri, 2, coords, tris).unwrap();
    add_isotropic_metric(&mut mesh, metric_value);
    mesh
}

/// A ring of `n` tetrahedra sharing the edge `(a, b)` along the z-axis,
/// with ring vertices on a unit circle at `z = 0.5` (spec.md §8 scenario
/// 3). When `sliver_ring_index` is `Some(i)`, ring vertex `i` is pulled in
/// close to the shared edge, flattening the two tets that touch it into
/// slivers.
pub fn tet_ring(n: usize, sliver_ring_index: Option<usize>) -> Mesh {
    assert!(n >= 3, "a tet ring needs at least 3 tets");
    let mut coords = vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0]; // a, b
    for i in 0..n {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
        let radius = if Some(i) == sliver_ring_index { 0.02 } else { 1.0 };
        coords.extend_from_slice(&[radius * theta.cos(), radius * theta.sin(), 0.5]);
    }
    let (a, b) = (0usize, 1usize);
    let mut tets = Vec::new();
    for i in 0..n {
        let v0 = 2 + i;
        let v1 = 2 + (i + 1) % n;
        tets.extend_from_slice(&[a, b, v0, v1]);
    }
    let mut mesh = Mesh::new(Dimension::Tet, 3, coords, tets).unwrap();
    add_isotropic_metric(&mut mesh, 1.0);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_has_two_triangles_and_five_edges() {
        let mesh = unit_square_isotropic();
        assert_eq!(mesh.nents(Dimension::Tri), 2);
        assert_eq!(mesh.nents(Dimension::Edge), 5);
        assert!(mesh.has_metric());
    }

    #[test]
    fn tet_ring_has_n_tets_and_shared_edge() {
        let mesh = tet_ring(5, None);
        assert_eq!(mesh.nents(Dimension::Tet), 5);
        let shared_edge = (0..mesh.nents(Dimension::Edge))
            .find(|&e| {
                let v = mesh.ask_down(Dimension::Edge, e);
                (v[0] == 0 && v[1] == 1) || (v[0] == 1 && v[1] == 0)
            })
            .expect("ring must contain the shared edge (0,1)");
        let up = mesh.ask_up(Dimension::Edge, Dimension::Tet);
        assert_eq!(up.degree(shared_edge), 5);
    }

    #[test]
    fn tet_ring_sliver_has_low_quality_neighbors() {
        let mesh = tet_ring(5, Some(0));
        let qualities: Vec<f64> =
            (0..mesh.nents(Dimension::Tet)).map(|t| crate::quality::element_quality(&mesh, Dimension::Tet, t)).collect();
        assert!(qualities.iter().any(|&q| q < 0.3));
    }

    #[test]
    fn grid_isotropic_produces_expected_counts() {
        let mesh = grid_isotropic(3, 1.0);
        assert_eq!(mesh.nents(Dimension::Vert), 16);
        assert_eq!(mesh.nents(Dimension::Tri), 18);
    }
}
