//! Symmetric eigendecomposition with an explicit convergence flag.
//!
//! spec.md §4.1 requires the non-convergence path to carry both a result
//! and a flag rather than an out-parameter — a sum type, per spec.md §9's
//! re-architecture note. `nalgebra::SymmetricEigen` always "succeeds" (it
//! has no iteration cap a caller can observe), so it cannot express that;
//! the 3×3 case below is a small cyclic Jacobi sweep with an explicit
//! iteration cap instead.

use super::{Mat2, Mat3, Vec2, Vec3, positivize2, positivize3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eigen2 {
    Converged { q: Mat2, l: Vec2 },
    /// Callers treat a non-converged matrix as isotropic using the
    /// diagonal average (spec.md §4.1).
    NonConverged { diag_avg: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eigen3 {
    Converged { q: Mat3, l: Vec3 },
    NonConverged { diag_avg: f64 },
}

/// Closed-form symmetric 2×2 eigendecomposition. Always converges.
pub fn decompose_eigen2(m: &Mat2) -> Eigen2 {
    let a = m[(0, 0)];
    let b = m[(1, 0)];
    let d = m[(1, 1)];
    let mid = (a + d) / 2.0;
    let rad = (((a - d) / 2.0).powi(2) + b * b).sqrt();
    let l1 = mid + rad;
    let l2 = mid - rad;

    let v1 = if b.abs() > 1e-300 || (a - l1).abs() > 1e-300 {
        Vec2::new(b, l1 - a)
    } else {
        Vec2::new(1.0, 0.0)
    };
    let v1 = if v1.norm() > 1e-300 {
        v1.normalize()
    } else {
        Vec2::new(1.0, 0.0)
    };
    let v1 = positivize2(v1);
    let v2 = Vec2::new(-v1.y, v1.x);

    Eigen2::Converged {
        q: Mat2::from_columns(&[v1, v2]),
        l: Vec2::new(l1, l2),
    }
}

/// Cyclic Jacobi eigenvalue algorithm on a symmetric 3×3 matrix: repeatedly
/// zero the largest-magnitude off-diagonal entry with a Givens rotation,
/// accumulating the rotations into the eigenvector basis, until the
/// largest off-diagonal entry falls below tolerance or the iteration cap
/// is hit.
pub fn decompose_eigen3(m: &Mat3) -> Eigen3 {
    const MAX_SWEEPS: usize = 100;
    const TOL: f64 = 1e-13;

    let mut a = *m;
    let mut v = Mat3::identity();

    for _ in 0..MAX_SWEEPS {
        let (mut p, mut q, mut max_val) = (0usize, 1usize, 0.0f64);
        for i in 0..3 {
            for j in (i + 1)..3 {
                let av = a[(i, j)].abs();
                if av > max_val {
                    max_val = av;
                    p = i;
                    q = j;
                }
            }
        }
        if max_val < TOL {
            let l = Vec3::new(a[(0, 0)], a[(1, 1)], a[(2, 2)]);
            return Eigen3::Converged {
                q: canonicalize_basis(v),
                l,
            };
        }

        let theta = if (a[(q, q)] - a[(p, p)]).abs() < 1e-300 {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * a[(p, q)] / (a[(q, q)] - a[(p, p)])).atan()
        };
        let (s, c) = theta.sin_cos();
        let mut g = Mat3::identity();
        g[(p, p)] = c;
        g[(q, q)] = c;
        g[(p, q)] = s;
        g[(q, p)] = -s;

        a = g.transpose() * a * g;
        v *= g;
    }

    log::warn!("3x3 symmetric eigendecomposition did not converge after {MAX_SWEEPS} sweeps");
    Eigen3::NonConverged {
        diag_avg: (m[(0, 0)] + m[(1, 1)] + m[(2, 2)]) / 3.0,
    }
}

fn canonicalize_basis(v: Mat3) -> Mat3 {
    let cols: Vec<Vec3> = (0..3).map(|i| positivize3(v.column(i).into_owned())).collect();
    Mat3::from_columns(&cols)
}

pub fn compose_eigen2(q: &Mat2, l: &Vec2) -> Mat2 {
    q * Mat2::from_diagonal(l) * q.transpose()
}

pub fn compose_eigen3(q: &Mat3, l: &Vec3) -> Mat3 {
    q * Mat3::from_diagonal(l) * q.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{are_close_mat2, are_close_mat3};

    #[test]
    fn eigen2_reconstructs_symmetric_matrix() {
        let m = Mat2::new(3.0, 1.0, 1.0, 2.0);
        match decompose_eigen2(&m) {
            Eigen2::Converged { q, l } => {
                assert!(l.x > 0.0 && l.y > 0.0);
                let gram = q.transpose() * q;
                assert!(are_close_mat2(&gram, &Mat2::identity()));
                assert!(are_close_mat2(&compose_eigen2(&q, &l), &m));
            }
            Eigen2::NonConverged { .. } => panic!("2x2 eigendecomposition always converges"),
        }
    }

    #[test]
    fn eigen3_reconstructs_symmetric_matrix() {
        let m = Mat3::new(4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0);
        match decompose_eigen3(&m) {
            Eigen3::Converged { q, l } => {
                assert!(l.iter().all(|&li| li > 0.0));
                let gram = q.transpose() * q;
                assert!(are_close_mat3(&gram, &Mat3::identity()));
                assert!(are_close_mat3(&compose_eigen3(&q, &l), &m));
            }
            Eigen3::NonConverged { .. } => panic!("well-conditioned SPD matrix should converge"),
        }
    }

    #[test]
    fn eigen3_handles_isotropic_matrix() {
        let m = Mat3::identity() * 2.0;
        match decompose_eigen3(&m) {
            Eigen3::Converged { l, .. } => {
                for li in l.iter() {
                    assert!((li - 2.0).abs() < 1e-9);
                }
            }
            Eigen3::NonConverged { .. } => panic!("isotropic matrix should converge trivially"),
        }
    }
}
