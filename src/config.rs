//! Tunables for a full adaptation run (spec.md §6 leaves these as bare
//! function parameters; bundled here the way the teacher bundles
//! mesh-construction options, so a driver call site reads as one value
//! rather than a five-argument tuple).

/// Thresholds and driver knobs for refine/coarsen/swap and the top-level
/// `adapt_pass` loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptConfig {
    /// Edges longer than this (in the metric) are refinement candidates.
    pub refine_above: f64,
    /// Edges shorter than this are coarsening candidates.
    pub coarsen_below: f64,
    /// Quality floor below which an element is a sliver.
    pub qual_floor: f64,
    /// Adjacency dilation depth used by `mark_sliver_layers`.
    pub nlayers: usize,
    /// Whether a swap with quality exactly equal to the old minimum is
    /// accepted (spec.md §9 "debatable, should be made configurable").
    /// Default `false` (strict `>`, matching the original source).
    pub swap_accept_equal: bool,
    /// Ring-size cap for the 3D swap dynamic program (spec.md §4.7's
    /// "modest constant").
    pub max_ring_size: usize,
    /// Maximum number of refine/coarsen/swap passes `adapt_pass` will run
    /// before giving up even if the mesh has not converged.
    pub max_passes: usize,
    pub verbose: bool,
}

impl Default for AdaptConfig {
    fn default() -> Self {
        AdaptConfig {
            refine_above: 1.5,
            coarsen_below: 0.47,
            qual_floor: 10.0 * crate::algebra::EPSILON,
            nlayers: 2,
            swap_accept_equal: false,
            max_ring_size: 12,
            max_passes: 10,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_thresholds() {
        let cfg = AdaptConfig::default();
        assert_eq!(cfg.refine_above, 1.5);
        assert_eq!(cfg.coarsen_below, 0.47);
        assert!(!cfg.swap_accept_equal);
    }
}
