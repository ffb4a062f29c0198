//! End-to-end regressions for the three concrete scenarios of spec.md §8,
//! exercised through the public driver rather than by hand-building
//! meshes, the way the teacher's own `tests/` integration files drive
//! its top-level API instead of internal helpers.

use meshadapt::adapt::adapt_pass;
use meshadapt::mesh::{Tag, TagData, TransferPolicy};
use meshadapt::mesh_examples::{grid_isotropic, tet_ring, unit_square_isotropic};
use meshadapt::quality::{element_quality, metric_edge_length};
use meshadapt::{AdaptConfig, Dimension};

/// Scenario 1: a unit square, two triangles, isotropic metric `diag(1,1)`.
/// Repeated refinement (each call only accepts a conflict-free subset of
/// candidates, so convergence can take more than one call) must terminate
/// with every edge at or under the threshold, strictly more triangles than
/// the start, and no triangle worse than the originals.
#[test]
fn refine_converges_to_a_fully_sized_mesh() {
    let mesh = unit_square_isotropic();
    let cfg = AdaptConfig { refine_above: 0.6, coarsen_below: 0.0, ..Default::default() };

    let original_min_quality = (0..mesh.nents(Dimension::Tri))
        .map(|t| element_quality(&mesh, Dimension::Tri, t))
        .fold(f64::INFINITY, f64::min);

    let mut current = mesh.clone();
    for _ in 0..50 {
        let (next, changed) = adapt_pass(&current, &cfg);
        current = next;
        if !changed {
            break;
        }
    }

    assert!(current.nents(Dimension::Tri) > mesh.nents(Dimension::Tri));
    for e in 0..current.nents(Dimension::Edge) {
        assert!(metric_edge_length(&current, e) <= cfg.refine_above + 1e-9);
    }
    let final_min_quality = (0..current.nents(Dimension::Tri))
        .map(|t| element_quality(&current, Dimension::Tri, t))
        .fold(f64::INFINITY, f64::min);
    assert!(final_min_quality >= original_min_quality - 1e-9);
}

/// Scenario 2: the same square with metric `diag(100,1)` asks for edges
/// ten times shorter along x than along y; after adaptation, interior
/// edges nearly parallel to x should outnumber those nearly parallel to y.
#[test]
fn anisotropic_metric_produces_x_biased_refinement() {
    let mesh = meshadapt::mesh_examples::unit_square_anisotropic(100.0, 1.0);
    let cfg = AdaptConfig { refine_above: 1.0, coarsen_below: 0.0, ..Default::default() };

    let mut current = mesh;
    for _ in 0..50 {
        let (next, changed) = adapt_pass(&current, &cfg);
        current = next;
        if !changed {
            break;
        }
    }

    let mut x_leaning = 0;
    let mut y_leaning = 0;
    for e in 0..current.nents(Dimension::Edge) {
        let verts = current.ask_down(Dimension::Edge, e);
        let a = current.coords2(verts[0]);
        let b = current.coords2(verts[1]);
        let d = b - a;
        if d.x.abs() > d.y.abs() {
            x_leaning += 1;
        } else if d.y.abs() > d.x.abs() {
            y_leaning += 1;
        }
    }
    assert!(x_leaning > y_leaning);
}

/// Scenario 3: a 5-tet ring around a shared edge with one sliver (quality
/// ~0.01 by construction). A full adaptation pass must not leave the mesh
/// worse off than it started.
#[test]
fn swap_improves_or_preserves_a_sliver_ring() {
    let mesh = tet_ring(5, Some(0));
    let cfg = AdaptConfig { max_ring_size: 12, ..Default::default() };

    let before_min = (0..mesh.nents(Dimension::Tet))
        .map(|t| element_quality(&mesh, Dimension::Tet, t))
        .fold(f64::INFINITY, f64::min);

    let (after, _) = adapt_pass(&mesh, &cfg);

    let after_min = (0..after.nents(Dimension::Tet))
        .map(|t| element_quality(&after, Dimension::Tet, t))
        .fold(f64::INFINITY, f64::min);
    assert!(after_min >= before_min - 1e-9);
}

fn triangle_area(mesh: &meshadapt::Mesh, entity: usize) -> f64 {
    let verts = mesh.ask_down(Dimension::Tri, entity);
    let a = mesh.coords2(verts[0]);
    let b = mesh.coords2(verts[1]);
    let c = mesh.coords2(verts[2]);
    (0.5 * ((b - a).x * (c - a).y - (b - a).y * (c - a).x)).abs()
}

/// Scenario 6: a constant element tag under CONSERVE, on a unit-box mesh,
/// survives a full adapt cycle (refine, then coarsen, then swap) with its
/// volume-weighted total unchanged.
#[test]
fn conserve_tag_survives_a_full_adapt_cycle() {
    let mut mesh = grid_isotropic(2, 1.0);
    let data = vec![3.0; mesh.nents(Dimension::Tri)];
    let tag = Tag::new(TagData::F64(data), 1, TransferPolicy::Conserve, true).unwrap();
    mesh.add_tag(Dimension::Tri, "density", tag).unwrap();

    let before: f64 = (0..mesh.nents(Dimension::Tri)).map(|e| triangle_area(&mesh, e) * 3.0).sum();

    let cfg = AdaptConfig { refine_above: 0.6, coarsen_below: 0.0, ..Default::default() };
    let (after, _changed) = adapt_pass(&mesh, &cfg);

    let tag = after.get_tag(Dimension::Tri, "density").unwrap();
    let total_after: f64 = (0..after.nents(Dimension::Tri)).map(|e| triangle_area(&after, e) * tag.component(e, 0)).sum();
    assert!((before - total_after).abs() < 1e-6 * before);
}
