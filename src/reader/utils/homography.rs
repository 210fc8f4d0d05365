use std::ops::{Index, IndexMut};

use super::geometry::Point;

// Projective map from symbol grid coordinates onto image coordinates
//------------------------------------------------------------------------------

/// Coefficients h11..h32 of a 3x3 projection with h33 fixed at 1
#[derive(Debug, PartialEq, Clone)]
pub struct Homography(pub [f64; 8]);

impl Index<usize> for Homography {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Homography {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Homography {
    /// Solves for the projection taking `src[i]` onto `dst[i]`. Returns `None` when three of the
    /// points are collinear.
    pub fn compute(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> Option<Self> {
        // Each correspondence gives two rows of the augmented 8x9 system
        let mut m = [[0.0; 9]; 8];
        for (i, (&(x, y), &(u, v))) in src.iter().zip(&dst).enumerate() {
            m[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            m[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }
        gauss_jordan(&mut m).map(Self)
    }

    /// Projects a grid point, keeping sub-pixel precision.
    pub fn map_f(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let w = self[6] * x + self[7] * y + 1.0;
        if w.abs() <= f64::EPSILON {
            return None;
        }

        let u = self[0] * x + self[1] * y + self[2];
        let v = self[3] * x + self[4] * y + self[5];
        Some((u / w, v / w))
    }

    /// Projects a grid point onto the nearest pixel.
    pub fn map(&self, x: f64, y: f64) -> Option<Point> {
        let (u, v) = self.map_f(x, y)?;
        let to_i32 = |f: f64| {
            let f = f.round();
            (f >= i32::MIN as f64 && f <= i32::MAX as f64).then_some(f as i32)
        };
        Some(Point { x: to_i32(u)?, y: to_i32(v)? })
    }
}

// Reduces the augmented matrix in place with partial pivoting. None if it is singular.
fn gauss_jordan(m: &mut [[f64; 9]; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);

        let p = m[col][col];
        m[col].iter_mut().for_each(|v| *v /= p);

        let row = m[col];
        for (r, other) in m.iter_mut().enumerate() {
            let f = other[col];
            if r != col && f != 0.0 {
                other.iter_mut().zip(row).for_each(|(v, pv)| *v -= f * pv);
            }
        }
    }
    Some(std::array::from_fn(|i| m[i][8]))
}

#[cfg(test)]
mod homography_tests {
    use crate::reader::utils::geometry::Point;

    use super::Homography;

    #[test]
    fn test_affine() {
        // Module size 10 with the symbol offset by 40 px
        let src = [(0.0, 0.0), (21.0, 0.0), (21.0, 21.0), (0.0, 21.0)];
        let dst = [(40.0, 40.0), (250.0, 40.0), (250.0, 250.0), (40.0, 250.0)];
        let h = Homography::compute(src, dst).unwrap();
        assert!(h[6].abs() < 1e-12 && h[7].abs() < 1e-12);
        assert_eq!(h.map(3.5, 3.5), Some(Point { x: 75, y: 75 }));
        assert_eq!(h.map(17.5, 3.5), Some(Point { x: 215, y: 75 }));
    }

    #[test]
    fn test_perspective_hits_control_points() {
        let src = [(3.5, 3.5), (29.5, 3.5), (26.5, 26.5), (3.5, 29.5)];
        let dst = [(52.0, 61.0), (300.0, 80.0), (270.0, 290.0), (40.0, 310.0)];
        let h = Homography::compute(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst) {
            let (u, v) = h.map_f(s.0, s.1).unwrap();
            assert!((u - d.0).abs() < 1e-6 && (v - d.1).abs() < 1e-6, "{s:?} -> ({u}, {v})");
        }
        assert!(h[6] != 0.0 || h[7] != 0.0);
    }

    #[test]
    fn test_collinear_points() {
        let src = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let dst = [(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)];
        assert!(Homography::compute(src, dst).is_none());
    }

    #[test]
    fn test_point_at_infinity() {
        let h = Homography([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        assert!(h.map(-1.0, 5.0).is_none());
        assert_eq!(h.map_f(1.0, 4.0), Some((0.5, 2.0)));
    }
}
