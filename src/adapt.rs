//! Top-level adaptation driver (spec.md §2, §5): a single-threaded
//! cooperative loop over the three operators, ordered refine -> coarsen ->
//! swap per pass, until no edge violates the size criterion or
//! `cfg.max_passes` is exhausted.

use crate::config::AdaptConfig;
use crate::mesh::{Dimension, Mesh};
use crate::ops::{coarsen_by_size, refine_by_size, swap_edges};
use crate::quality::metric_edge_length;

/// True iff some edge is longer than `cfg.refine_above` or shorter than
/// `cfg.coarsen_below` (spec.md §2's pass-loop condition).
fn has_size_violation(mesh: &Mesh, cfg: &AdaptConfig) -> bool {
    (0..mesh.nents(Dimension::Edge)).any(|e| {
        let len = metric_edge_length(mesh, e);
        len > cfg.refine_above || len < cfg.coarsen_below
    })
}

/// Run refine/coarsen/swap in sequence once, spec.md §2's "each operator is
/// mark candidates -> build cavities -> propose -> score -> accept ->
/// commit", rebuilding the mesh from the previous operator's output each
/// step.
pub fn adapt_pass(mesh: &Mesh, cfg: &AdaptConfig) -> (Mesh, bool) {
    let (after_refine, refined) = refine_by_size(mesh, cfg);
    log::trace!("refine pass: changed={refined}");
    let (after_coarsen, coarsened) = coarsen_by_size(&after_refine, cfg);
    log::trace!("coarsen pass: changed={coarsened}");
    let (after_swap, swapped) = swap_edges(&after_coarsen, cfg);
    log::trace!("swap pass: changed={swapped}");
    (after_swap, refined || coarsened || swapped)
}

/// Repeat [`adapt_pass`] while any edge still violates the size criterion,
/// up to `cfg.max_passes` passes (spec.md §2: "while any size criterion is
/// violated ... re-evaluate"). Stops early if a pass makes no change at all,
/// since further passes would be identical.
pub fn adapt(mesh: &Mesh, cfg: &AdaptConfig) -> Mesh {
    let mut current = mesh.clone();
    for pass in 0..cfg.max_passes {
        if !has_size_violation(&current, cfg) {
            log::debug!("adapt: converged after {pass} pass(es)");
            return current;
        }
        let (next, changed) = adapt_pass(&current, cfg);
        if cfg.verbose {
            log::debug!(
                "adapt: pass {pass} changed={changed} nverts={} ntop={}",
                next.nents(Dimension::Vert),
                next.nents(next.dim())
            );
        }
        current = next;
        if !changed {
            log::debug!("adapt: no further progress after {pass} pass(es), stopping");
            break;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_examples::unit_square_isotropic;

    #[test]
    fn converges_on_an_already_well_sized_mesh() {
        let mesh = unit_square_isotropic();
        let cfg = AdaptConfig::default();
        let adapted = adapt(&mesh, &cfg);
        assert_eq!(adapted.nents(Dimension::Tri), mesh.nents(Dimension::Tri));
    }

    #[test]
    fn refines_a_too_coarse_mesh() {
        let mesh = unit_square_isotropic();
        let cfg = AdaptConfig { refine_above: 1.0, coarsen_below: 0.01, ..Default::default() };
        let adapted = adapt(&mesh, &cfg);
        assert!(adapted.nents(Dimension::Tri) > mesh.nents(Dimension::Tri));
    }
}
