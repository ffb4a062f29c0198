//! Metric algebra: symmetric positive-definite tensor operations (spec.md
//! §4.2). A [`Metric`] is dispatched over the two supported space
//! dimensions the way spec.md §9 recommends ("sum-typed enumerants over
//! {d=2, d=3} dispatched at the operator boundary") rather than through
//! const generics, since the intersection and decomposition algorithms
//! below differ enough between 2×2 and 3×3 that sharing one generic body
//! would obscure more than it would save.

use crate::algebra::eigen::{self, Eigen2, Eigen3};
use crate::algebra::{Mat2, Mat3, Vec2, Vec3};
use nalgebra::linalg::Cholesky;

/// A symmetric positive-definite tensor at a point, in either 2 or 3
/// spatial dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    D2(Mat2),
    D3(Mat3),
}

/// A displacement direction matching a [`Metric`]'s dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    D2(Vec2),
    D3(Vec3),
}

impl Metric {
    /// Reconstruct a metric from its unique symmetric entries, stored the
    /// way a `METRIC`-policy tag does: 3 components in 2D (`m00, m01,
    /// m11`), 6 in 3D (`m00, m01, m02, m11, m12, m22`).
    pub fn from_compact(c: &[f64]) -> Metric {
        match c.len() {
            3 => Metric::D2(Mat2::new(c[0], c[1], c[1], c[2])),
            6 => Metric::D3(Mat3::new(
                c[0], c[1], c[2], //
                c[1], c[3], c[4], //
                c[2], c[4], c[5],
            )),
            n => panic!("metric compact form must have 3 or 6 components, got {n}"),
        }
    }

    pub fn to_compact(&self) -> Vec<f64> {
        match self {
            Metric::D2(m) => vec![m[(0, 0)], m[(0, 1)], m[(1, 1)]],
            Metric::D3(m) => vec![
                m[(0, 0)],
                m[(0, 1)],
                m[(0, 2)],
                m[(1, 1)],
                m[(1, 2)],
                m[(2, 2)],
            ],
        }
    }

    pub fn is_spd(&self) -> bool {
        match self {
            Metric::D2(m) => Cholesky::new(*m).is_some(),
            Metric::D3(m) => Cholesky::new(*m).is_some(),
        }
    }
}

pub fn metric_length(m: &Metric, dir: &Direction) -> f64 {
    match (m, dir) {
        (Metric::D2(m), Direction::D2(v)) => (v.dot(&(m * v))).sqrt(),
        (Metric::D3(m), Direction::D3(v)) => (v.dot(&(m * v))).sqrt(),
        _ => panic!("metric_length: metric and direction dimensions differ"),
    }
}

pub fn metric_desired_length(m: &Metric, dir: &Direction) -> f64 {
    1.0 / metric_length(m, dir)
}

/// `(R, h)` with `R` orthonormal and `h` the desired length along each of
/// `R`'s axes (`h_i = 1/sqrt(lambda_i)`). Falls back to an isotropic basis
/// using the diagonal average when the eigensolver does not converge.
pub fn decompose_metric(m: &Metric) -> (Metric, Vec<f64>) {
    match m {
        Metric::D2(mat) => match eigen::decompose_eigen2(mat) {
            Eigen2::Converged { q, l } => (
                Metric::D2(q),
                vec![1.0 / l.x.sqrt(), 1.0 / l.y.sqrt()],
            ),
            Eigen2::NonConverged { diag_avg } => {
                log::warn!("2D metric decomposition did not converge; using isotropic fallback");
                (Metric::D2(Mat2::identity()), vec![1.0 / diag_avg.sqrt(); 2])
            }
        },
        Metric::D3(mat) => match eigen::decompose_eigen3(mat) {
            Eigen3::Converged { q, l } => (
                Metric::D3(q),
                vec![1.0 / l.x.sqrt(), 1.0 / l.y.sqrt(), 1.0 / l.z.sqrt()],
            ),
            Eigen3::NonConverged { diag_avg } => {
                log::warn!("3D metric decomposition did not converge; using isotropic fallback");
                (Metric::D3(Mat3::identity()), vec![1.0 / diag_avg.sqrt(); 3])
            }
        },
    }
}

/// The metric `M` that realizes the largest ellipsoid contained in both `a`
/// and `b`'s unit balls, via simultaneous congruence reduction: a Cholesky
/// factor `a = L L^T` turns `b` into the symmetric matrix
/// `s = L^-1 b L^-T`; its eigendecomposition `s = u diag(d) u^T` gives a
/// basis `p = L^-T u` with `p^T a p = I` and `p^T b p = diag(d)`. Setting
/// `w_i = max(1, d_i)` and folding back through `a` (`p^-1 = p^T a`) yields
/// `a p diag(w) p^T a`, which agrees pointwise with `max(length_a, length_b)`
/// along every `p` axis and therefore everywhere (see crate tests).
pub fn intersect_metrics(a: &Metric, b: &Metric) -> Metric {
    match (a, b) {
        (Metric::D2(a), Metric::D2(b)) => Metric::D2(intersect2(a, b)),
        (Metric::D3(a), Metric::D3(b)) => Metric::D3(intersect3(a, b)),
        _ => panic!("intersect_metrics: mismatched dimensions"),
    }
}

fn intersect2(a: &Mat2, b: &Mat2) -> Mat2 {
    let chol = Cholesky::new(*a).expect("intersect_metrics: `a` must be SPD");
    let l = chol.l();
    let l_inv = l.try_inverse().expect("intersect_metrics: singular Cholesky factor");
    let s = l_inv * b * l_inv.transpose();
    let (u, d) = match eigen::decompose_eigen2(&s) {
        Eigen2::Converged { q, l } => (q, l),
        Eigen2::NonConverged { diag_avg } => (Mat2::identity(), Vec2::new(diag_avg, diag_avg)),
    };
    let p = l_inv.transpose() * u;
    let w = Vec2::new(d.x.max(1.0), d.y.max(1.0));
    a * p * Mat2::from_diagonal(&w) * p.transpose() * a
}

fn intersect3(a: &Mat3, b: &Mat3) -> Mat3 {
    let chol = Cholesky::new(*a).expect("intersect_metrics: `a` must be SPD");
    let l = chol.l();
    let l_inv = l.try_inverse().expect("intersect_metrics: singular Cholesky factor");
    let s = l_inv * b * l_inv.transpose();
    let (u, d) = match eigen::decompose_eigen3(&s) {
        Eigen3::Converged { q, l } => (q, l),
        Eigen3::NonConverged { diag_avg } => {
            (Mat3::identity(), Vec3::new(diag_avg, diag_avg, diag_avg))
        }
    };
    let p = l_inv.transpose() * u;
    let w = Vec3::new(d.x.max(1.0), d.y.max(1.0), d.z.max(1.0));
    a * p * Mat3::from_diagonal(&w) * p.transpose() * a
}

/// `M^-1`. Chosen (per the original source) as the quantity safe to
/// linearly interpolate across several anisotropic inputs without an
/// eigendecomposition.
pub fn linearize(m: &Metric) -> Metric {
    match m {
        Metric::D2(m) => Metric::D2(crate::algebra::invert2(m)),
        Metric::D3(m) => Metric::D3(crate::algebra::invert3(m)),
    }
}

pub fn delinearize(m: &Metric) -> Metric {
    linearize(m)
}

pub fn interpolate_metrics(a: &Metric, b: &Metric, t: f64) -> Metric {
    match (linearize(a), linearize(b)) {
        (Metric::D2(la), Metric::D2(lb)) => delinearize(&Metric::D2(la * (1.0 - t) + lb * t)),
        (Metric::D3(la), Metric::D3(lb)) => delinearize(&Metric::D3(la * (1.0 - t) + lb * t)),
        _ => panic!("interpolate_metrics: mismatched dimensions"),
    }
}

/// `delinearize(mean(linearize(m_i)))`, used to average a metric over an
/// entity's vertices.
pub fn average_metrics(ms: &[Metric]) -> Metric {
    assert!(!ms.is_empty(), "average_metrics: empty input");
    let n = ms.len() as f64;
    match linearize(&ms[0]) {
        Metric::D2(first) => {
            let sum = ms[1..].iter().fold(first, |acc, m| match linearize(m) {
                Metric::D2(l) => acc + l,
                Metric::D3(_) => panic!("average_metrics: mismatched dimensions"),
            });
            delinearize(&Metric::D2(sum / n))
        }
        Metric::D3(first) => {
            let sum = ms[1..].iter().fold(first, |acc, m| match linearize(m) {
                Metric::D3(l) => acc + l,
                Metric::D2(_) => panic!("average_metrics: mismatched dimensions"),
            });
            delinearize(&Metric::D3(sum / n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::are_close;

    fn iso2(v: f64) -> Metric {
        Metric::D2(Mat2::new(v, 0.0, 0.0, v))
    }
    fn iso3(v: f64) -> Metric {
        Metric::D3(Mat3::identity() * v)
    }

    #[test]
    fn interpolate_with_self_is_length_preserving() {
        let a = Metric::D2(Mat2::new(4.0, 0.3, 0.3, 1.0));
        let v = Direction::D2(Vec2::new(1.0, 1.0));
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let interp = interpolate_metrics(&a, &a, t);
            assert!(are_close(metric_length(&interp, &v), metric_length(&a, &v)));
        }
    }

    #[test]
    fn intersect_dominates_both_inputs() {
        let a = Metric::D2(Mat2::new(4.0, 0.0, 0.0, 1.0));
        let b = Metric::D2(Mat2::new(1.0, 0.0, 0.0, 4.0));
        let inter = intersect_metrics(&a, &b);
        for (x, y) in [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (-0.5, 0.7)] {
            let v = Direction::D2(Vec2::new(x, y));
            let la = metric_length(&a, &v);
            let lb = metric_length(&b, &v);
            let li = metric_length(&inter, &v);
            assert!(li + 1e-9 >= la.max(lb));
        }
    }

    #[test]
    fn intersect_of_orthogonal_anisotropies_is_isotropic() {
        let a = Metric::D2(Mat2::new(4.0, 0.0, 0.0, 1.0));
        let b = Metric::D2(Mat2::new(1.0, 0.0, 0.0, 4.0));
        let inter = intersect_metrics(&a, &b);
        if let Metric::D2(m) = inter {
            assert!(are_close(m[(0, 0)], 4.0));
            assert!(are_close(m[(1, 1)], 4.0));
            assert!(m[(0, 1)].abs() < 1e-8);
        } else {
            panic!("expected D2");
        }
    }

    #[test]
    fn interpolate_isotropic_matches_inverse_average() {
        // linearize = inverse; t=0.5 midpoint of diag(1,1) and diag(4,4) is
        // delinearize(avg(1, 0.25)) = delinearize(0.625) = 1.6.
        let m = interpolate_metrics(&iso2(1.0), &iso2(4.0), 0.5);
        if let Metric::D2(m) = m {
            assert!(are_close(m[(0, 0)], 1.6));
        } else {
            panic!("expected D2");
        }
    }

    #[test]
    fn average_metrics_matches_pairwise_interpolation_at_midpoint() {
        let ms = vec![iso3(1.0), iso3(4.0)];
        let avg = average_metrics(&ms);
        let interp = interpolate_metrics(&iso3(1.0), &iso3(4.0), 0.5);
        assert_eq!(avg, interp);
    }

    #[test]
    fn compact_round_trip_2d() {
        let m = Metric::D2(Mat2::new(4.0, 0.5, 0.5, 2.0));
        let back = Metric::from_compact(&m.to_compact());
        assert_eq!(m, back);
    }

    #[test]
    fn compact_round_trip_3d() {
        let m = Metric::D3(Mat3::new(4.0, 0.5, 0.1, 0.5, 2.0, 0.2, 0.1, 0.2, 3.0));
        let back = Metric::from_compact(&m.to_compact());
        assert_eq!(m, back);
    }
}
