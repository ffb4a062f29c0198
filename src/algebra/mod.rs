//! Fixed-size column-major vectors and matrices up to 3×3 (spec.md §4.1).
//!
//! Storage is borrowed from `nalgebra` (the teacher's `geometry.rs` already
//! reaches for `nalgebra::{Point2, Point3}` for element coordinates); the
//! closed-form operations below are written out explicitly rather than
//! deferred to `nalgebra`'s own `determinant`/`try_inverse`/`cross`, because
//! the symmetric eigendecomposition this module feeds into (see
//! [`eigen`]) needs a convergence flag that `nalgebra::SymmetricEigen`
//! does not expose, and keeping the elementary operations alongside it in
//! the same explicit style keeps the whole module legible as one unit.

pub mod eigen;

use nalgebra as na;

pub type Vec2 = na::Vector2<f64>;
pub type Vec3 = na::Vector3<f64>;
pub type Mat2 = na::Matrix2<f64>;
pub type Mat3 = na::Matrix3<f64>;

/// Default relative tolerance used throughout the crate, matching the
/// `EPSILON ~= 1e-10` of spec.md §4.1.
pub const EPSILON: f64 = 1e-10;

pub fn determinant2(m: &Mat2) -> f64 {
    m[(0, 0)] * m[(1, 1)] - m[(1, 0)] * m[(0, 1)]
}

pub fn determinant3(m: &Mat3) -> f64 {
    let a = m[(0, 0)];
    let b = m[(1, 0)];
    let c = m[(2, 0)];
    let d = m[(0, 1)];
    let e = m[(1, 1)];
    let f = m[(2, 1)];
    let g = m[(0, 2)];
    let h = m[(1, 2)];
    let i = m[(2, 2)];
    (a * e * i) + (b * f * g) + (c * d * h) - (c * e * g) - (b * d * i) - (a * f * h)
}

/// Closed-form adjugate/determinant inverse. Precondition: `|det m| > 0`.
pub fn invert2(m: &Mat2) -> Mat2 {
    let det = determinant2(m);
    debug_assert!(det.abs() > 0.0, "invert2: singular matrix");
    let a = m[(0, 0)];
    let b = m[(1, 0)];
    let c = m[(0, 1)];
    let d = m[(1, 1)];
    Mat2::new(d, -b, -c, a) / det
}

/// Closed-form inverse via the cross-product adjugate construction, same
/// identity the original source uses: the adjugate's columns are cross
/// products of the other two columns of `m`. Precondition: `|det m| > 0`.
pub fn invert3(m: &Mat3) -> Mat3 {
    let det = determinant3(m);
    debug_assert!(det.abs() > 0.0, "invert3: singular matrix");
    let c0 = m.column(0).into_owned();
    let c1 = m.column(1).into_owned();
    let c2 = m.column(2).into_owned();
    let b0 = c1.cross(&c2);
    let b1 = c2.cross(&c0);
    let b2 = c0.cross(&c1);
    Mat3::from_columns(&[b0, b1, b2]).transpose() / det
}

#[inline]
pub fn cross2(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

#[inline]
pub fn cross3(a: &Vec3, b: &Vec3) -> Vec3 {
    a.cross(b)
}

fn cross_matrix(axis: &Vec3) -> Mat3 {
    Mat3::new(
        0.0, -axis.z, axis.y, //
        axis.z, 0.0, -axis.x, //
        -axis.y, axis.x, 0.0,
    )
}

pub fn tensor_product3(a: &Vec3, b: &Vec3) -> Mat3 {
    a * b.transpose()
}

pub fn tensor_product2(a: &Vec2, b: &Vec2) -> Mat2 {
    a * b.transpose()
}

/// Rodrigues' rotation formula: rotate by `angle` radians around `axis`
/// (need not be pre-normalized; it is normalized internally).
pub fn rotate3(angle: f64, axis: &Vec3) -> Mat3 {
    let axis = axis.normalize();
    let (s, c) = angle.sin_cos();
    Mat3::identity() * c + cross_matrix(&axis) * s + tensor_product3(&axis, &axis) * (1.0 - c)
}

pub fn rotate2(angle: f64) -> Mat2 {
    let (s, c) = angle.sin_cos();
    Mat2::new(c, -s, s, c)
}

/// Given a unit 3-vector `v`, build an orthonormal basis whose first column
/// is `v`. Sorts components by absolute value, rotates 90 degrees in the
/// plane of the two largest-magnitude components, and zeroes the smallest
/// one before normalizing, to avoid dividing by a near-zero component.
pub fn form_ortho_basis(v: &Vec3) -> Mat3 {
    let mags = [v.x.abs(), v.y.abs(), v.z.abs()];
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| mags[j].partial_cmp(&mags[i]).unwrap());
    let (lc, mc, sc) = (order[0], order[1], order[2]);

    let mut w = Vec3::zeros();
    w[lc] = -v[mc];
    w[mc] = v[lc];
    w[sc] = 0.0;
    let w = w.normalize();
    let u = cross3(v, &w);

    Mat3::from_columns(&[*v, w, u])
}

/// Sign-canonicalize a unit vector: treat the component signs as bits of an
/// integer and negate the vector if the bitwise complement would be larger.
/// Makes eigenvector axes deterministic across runs.
pub fn positivize<const N: usize>(v: [f64; N]) -> [f64; N] {
    let mut bits: u32 = 0;
    for (i, vi) in v.iter().enumerate() {
        bits |= u32::from(*vi >= 0.0) << i;
    }
    let mask = (1u32 << N) - 1;
    let neg_bits = (!bits) & mask;
    if neg_bits > bits {
        v.map(|x| -x)
    } else {
        v
    }
}

pub fn positivize2(v: Vec2) -> Vec2 {
    Vec2::from(positivize([v.x, v.y]))
}

pub fn positivize3(v: Vec3) -> Vec3 {
    Vec3::from(positivize([v.x, v.y, v.z]))
}

pub fn are_close_tol(a: f64, b: f64, tol: f64, floor: f64) -> bool {
    let (am, bm) = (a.abs(), b.abs());
    if am < floor && bm < floor {
        return true;
    }
    (b - a).abs() / am.max(bm) <= tol
}

pub fn are_close(a: f64, b: f64) -> bool {
    are_close_tol(a, b, EPSILON, EPSILON)
}

pub fn are_close_vec<const N: usize>(a: &[f64; N], b: &[f64; N]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| are_close(*x, *y))
}

pub fn are_close_mat2(a: &Mat2, b: &Mat2) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| are_close(*x, *y))
}

pub fn are_close_mat3(a: &Mat3, b: &Mat3) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| are_close(*x, *y))
}

pub fn max_norm2(m: &Mat2) -> f64 {
    m.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}

pub fn max_norm3(m: &Mat3) -> f64 {
    m.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}

pub fn frobenius_norm2(m: &Mat2) -> f64 {
    m.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn frobenius_norm3(m: &Mat3) -> f64 {
    m.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn spd2() -> impl Strategy<Value = Mat2> {
        (0.1f64..10.0, -2.0f64..2.0, 0.1f64..10.0).prop_map(|(a, b, d)| {
            // a symmetric matrix [[a,b],[b,d']] is SPD for large enough diagonal
            Mat2::new(a + b.abs() + 0.5, b, b, d + b.abs() + 0.5)
        })
    }

    #[test]
    fn invert2_is_involution() {
        let m = Mat2::new(2.0, 0.5, 0.5, 3.0);
        let mi = invert2(&m);
        let back = invert2(&mi);
        assert!(are_close_mat2(&m, &back));
    }

    #[test]
    fn invert3_is_involution() {
        let m = Mat3::new(2.0, 0.1, 0.0, 0.1, 3.0, 0.2, 0.0, 0.2, 1.5);
        let mi = invert3(&m);
        let back = invert3(&mi);
        assert!(are_close_mat3(&m, &back));
    }

    #[test]
    fn cross2_matches_2x2_determinant_convention() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert_abs_diff_eq!(cross2(&a, &b), 1.0);
    }

    #[test]
    fn form_ortho_basis_is_orthonormal_with_first_column_v() {
        let v = Vec3::new(0.2, -0.9, 0.3).normalize();
        let basis = form_ortho_basis(&v);
        assert_abs_diff_eq!((basis.column(0) - v).norm(), 0.0, epsilon = 1e-9);
        let gram = basis.transpose() * basis;
        assert!(are_close_mat3(&gram, &Mat3::identity()));
        assert_abs_diff_eq!(determinant3(&basis), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn positivize_is_idempotent_and_sign_invariant() {
        let v = [0.3, -0.1, 0.7];
        let p = positivize(v);
        assert_eq!(positivize(p), p);
        let neg = v.map(|x| -x);
        assert_eq!(positivize(neg), p);
    }

    proptest! {
        #[test]
        fn invert2_round_trip(m in spd2()) {
            let back = invert2(&invert2(&m));
            prop_assert!(are_close_mat2(&m, &back));
        }
    }
}
