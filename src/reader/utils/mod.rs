use geometry::{Axis, Point};

use crate::common::metadata::Color;

use super::binarize::BinaryImage;

pub mod accumulate;
pub mod geometry;
pub mod homography;

// Run-length cross checks
//------------------------------------------------------------------------------

/// Tests the runs through `seed` along `A` against `pattern`, given as relative module widths.
/// The seed must sit in the middle run. Each run may deviate from its expected width by three
/// quarters of a module.
pub fn verify_pattern<A: Axis>(
    img: &BinaryImage,
    seed: &Point,
    pattern: &[f64],
    max_run: u32,
) -> bool {
    let Some(px) = img.get_at_point(seed) else {
        return false;
    };
    let color = Color::from(px);
    let mid = pattern.len() / 2;

    let back = runs_along::<A>(img, *seed, color, -1, mid + 1, max_run);
    let fwd = runs_along::<A>(img, *seed, color, 1, pattern.len() - mid, max_run);
    let mut runs: Vec<u32> = back.iter().rev().chain(&fwd[1..]).copied().collect();
    runs[mid] += fwd[0] + 1;

    if runs.iter().any(|&r| r == 0 || r > max_run) {
        return false;
    }

    let module = runs.iter().sum::<u32>() as f64 / pattern.iter().sum::<f64>();
    let tol = module * 0.75;
    pattern.iter().zip(&runs).all(|(&p, &r)| (r as f64 - p * module).abs() <= tol)
}

// Lengths of the first `n` runs met stepping away from `seed`, starting with the seed's own run
// minus the seed pixel. Stops at the image edge or once a run grows past `max_run`.
fn runs_along<A: Axis>(
    img: &BinaryImage,
    seed: Point,
    mut color: Color,
    step: i32,
    n: usize,
    max_run: u32,
) -> Vec<u32> {
    let mut runs = vec![0u32; n];
    let mut pos = seed;
    let mut i = 0;
    while runs[i] <= max_run {
        A::shift(&mut pos, step);
        let Some(px) = img.get_at_point(&pos) else {
            break;
        };
        let next = Color::from(px);
        if next != color {
            i += 1;
            if i == n {
                break;
            }
            color = next;
        }
        runs[i] += 1;
    }
    runs
}
