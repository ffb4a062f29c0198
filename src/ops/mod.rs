//! The three local mesh-modification operators (spec.md §4.5-§4.7), each
//! one independent-set pass over a class of candidate entities.

mod coarsen;
mod refine;
mod swap;

pub use coarsen::coarsen_by_size;
pub use refine::refine_by_size;
pub use swap::swap_edges;
