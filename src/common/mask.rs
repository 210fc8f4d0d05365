use std::ops::Deref;

use log::debug;

use super::metadata::Color;
use crate::builder::QR;

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub const ALL: [MaskPattern; 8] = [
        MaskPattern(0),
        MaskPattern(1),
        MaskPattern(2),
        MaskPattern(3),
        MaskPattern(4),
        MaskPattern(5),
        MaskPattern(6),
        MaskPattern(7),
    ];

    pub fn new(pattern: u8) -> Self {
        debug_assert!(pattern < 8, "Invalid masking pattern");
        Self(pattern & 0b111)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod mask_functions {
    pub fn checkerboard(r: i16, c: i16) -> bool {
        (r + c) & 1 == 0
    }

    pub fn horizontal_lines(r: i16, _: i16) -> bool {
        r & 1 == 0
    }

    pub fn vertical_lines(_: i16, c: i16) -> bool {
        c % 3 == 0
    }

    pub fn diagonal_lines(r: i16, c: i16) -> bool {
        (r + c) % 3 == 0
    }

    pub fn large_checkerboard(r: i16, c: i16) -> bool {
        ((r >> 1) + (c / 3)) & 1 == 0
    }

    pub fn fields(r: i16, c: i16) -> bool {
        let (r, c) = (r as i32, c as i32);
        ((r * c) & 1) + ((r * c) % 3) == 0
    }

    pub fn diamonds(r: i16, c: i16) -> bool {
        let (r, c) = (r as i32, c as i32);
        (((r * c) & 1) + ((r * c) % 3)) & 1 == 0
    }

    pub fn meadow(r: i16, c: i16) -> bool {
        let (r, c) = (r as i32, c as i32);
        (((r + c) & 1) + ((r * c) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    /// Predicate over (row, column) telling whether a data module gets flipped
    pub fn mask_functions(self) -> fn(i16, i16) -> bool {
        match self.0 {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            _ => mask_functions::meadow,
        }
    }
}

// Mask selection
//------------------------------------------------------------------------------

/// Tries all 8 masks on copies of the unmasked symbol and keeps the lowest penalty. Ties go to
/// the lower mask index, so the choice is deterministic.
pub fn apply_best_mask(qr: &mut QR) -> MaskPattern {
    let mut best = (MaskPattern(0), u32::MAX);
    for mask in MaskPattern::ALL {
        let mut candidate = qr.clone();
        candidate.apply_mask(mask);
        let pen = compute_total_penalty(&candidate);
        debug!("Mask {} penalty {pen}", *mask);
        if pen < best.1 {
            best = (mask, pen);
        }
    }
    debug!("Chose mask {} with penalty {}", *best.0, best.1);
    qr.apply_mask(best.0);
    best.0
}

pub fn compute_total_penalty(qr: &QR) -> u32 {
    let w = qr.width();
    let grid = (0..w as i16)
        .flat_map(|r| (0..w as i16).map(move |c| (r, c)))
        .map(|(r, c)| *qr.get(r, c))
        .collect::<Vec<_>>();
    let adj_pen = compute_adjacent_penalty(&grid, w);
    let blk_pen = compute_block_penalty(&grid, w);
    let fp_pen_h = compute_finder_pattern_penalty(&grid, w, true);
    let fp_pen_v = compute_finder_pattern_penalty(&grid, w, false);
    let bal_pen = compute_balance_penalty(&grid);
    adj_pen + blk_pen + fp_pen_h + fp_pen_v + bal_pen
}

// Runs of 5 or more same colored modules in a line score 3, plus 1 per extra module
fn compute_adjacent_penalty(grid: &[Color], w: usize) -> u32 {
    let mut pen = 0;
    let mut score_line = |line: &mut dyn Iterator<Item = Color>| {
        let mut last = None;
        let mut run = 0;
        for clr in line {
            if Some(clr) == last {
                run += 1;
            } else {
                if run >= 5 {
                    pen += run - 2;
                }
                last = Some(clr);
                run = 1;
            }
        }
        if run >= 5 {
            pen += run - 2;
        }
    };
    for i in 0..w {
        score_line(&mut (0..w).map(|j| grid[i * w + j]));
        score_line(&mut (0..w).map(|j| grid[j * w + i]));
    }
    pen
}

fn compute_block_penalty(grid: &[Color], w: usize) -> u32 {
    let mut pen = 0;
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let clr = grid[r * w + c];
            if clr == grid[(r + 1) * w + c]
                && clr == grid[r * w + c + 1]
                && clr == grid[(r + 1) * w + c + 1]
            {
                pen += 3;
            }
        }
    }
    pen
}

// Dark-light-dark-dark-dark-light-dark with 4 light modules on at least one side. Modules
// beyond the edge count as light.
fn compute_finder_pattern_penalty(grid: &[Color], w: usize, is_hor: bool) -> u32 {
    static PATTERN: [Color; 7] = [
        Color::Dark,
        Color::Light,
        Color::Dark,
        Color::Dark,
        Color::Dark,
        Color::Light,
        Color::Dark,
    ];

    let mut pen = 0;
    let w = w as isize;
    for i in 0..w {
        let get = |j: isize| {
            if j < 0 || j >= w {
                return Color::Light;
            }
            let idx = if is_hor { i * w + j } else { j * w + i };
            grid[idx as usize]
        };
        for j in 0..w - 6 {
            if (j..j + 7).map(get).ne(PATTERN.iter().copied()) {
                continue;
            }
            let is_light = |x| get(x) == Color::Light;
            if (j - 4..j).all(is_light) || (j + 7..j + 11).all(is_light) {
                pen += 40;
            }
        }
    }
    pen
}

// 10 points for every full 5% the dark ratio strays from 50%
fn compute_balance_penalty(grid: &[Color]) -> u32 {
    let tot = grid.len();
    let dark = grid.iter().filter(|&&c| c == Color::Dark).count();
    let dev = (dark * 20).abs_diff(tot * 10);
    let k = dev.div_ceil(tot).saturating_sub(1);
    (k * 10) as u32
}
