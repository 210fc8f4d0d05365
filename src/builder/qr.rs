use std::ops::Deref;

use image::{Rgb, RgbImage};

use crate::common::bit_utils::BitStream;
use crate::common::iter::EncRegionIter;
use crate::common::mask::MaskPattern;
use crate::common::metadata::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Color),
    Version(Color),
    Format(Color),
    Data(Color),
}

impl Deref for Module {
    type Target = Color;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Color::Light,
            Module::Func(c) | Module::Version(c) | Module::Format(c) | Module::Data(c) => c,
        }
    }
}

/// Module matrix of a QR symbol. Rows and columns accept negative indices, which wrap from the
/// bottom and right edges.
///
/// Only the builder writes modules. A built symbol is read-only:
///
/// ```compile_fail
/// use qrcodec::{encode, ECLevel, MaskPattern};
///
/// let mut qr = encode("frozen", ECLevel::L, None).unwrap();
/// qr.apply_mask(MaskPattern::new(2));
/// ```
///
/// ```compile_fail
/// use qrcodec::{builder::Module, encode, Color, ECLevel};
///
/// let mut qr = encode("frozen", ECLevel::L, None).unwrap();
/// qr.set(10, 10, Module::Data(Color::Dark));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QR {
    grid: Vec<Module>,
    w: usize,
    ver: Version,
    ecl: ECLevel,
    mask: Option<MaskPattern>,
}

// Matrix access
//------------------------------------------------------------------------------

impl QR {
    pub(crate) fn new(ver: Version, ecl: ECLevel) -> Self {
        let w = ver.width();
        Self { grid: vec![Module::Empty; w * w], w, ver, ecl, mask: None }
    }

    /// Symbol with every function module and info area drawn, and the encoding region left
    /// `Empty`. Tells readers which modules carry codewords.
    pub(crate) fn function_template(ver: Version) -> Self {
        let mut qr = Self::new(ver, ECLevel::M);
        qr.draw_all_function_patterns();
        qr.reserve_format_area();
        qr.draw_version_info();
        qr
    }

    pub fn grid(&self) -> &[Module] {
        &self.grid
    }

    pub fn version(&self) -> Version {
        self.ver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }

    pub fn mask(&self) -> Option<MaskPattern> {
        self.mask
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|&m| matches!(**m, Color::Dark)).count()
    }

    pub fn is_dark(&self, r: usize, c: usize) -> bool {
        debug_assert!(r < self.w && c < self.w, "Module out of bounds: {r} {c}");
        *self.grid[r * self.w + c] == Color::Dark
    }

    // One char per module: kind as the letter, lowercase when dark, '.' when empty
    #[cfg(test)]
    pub fn to_debug_str(&self) -> String {
        let mut res = String::from("\n");
        for row in self.grid.chunks(self.w) {
            res.extend(row.iter().map(|m| {
                let (ch, clr) = match m {
                    Module::Empty => return '.',
                    Module::Func(c) => ('f', c),
                    Module::Version(c) => ('v', c),
                    Module::Format(c) => ('m', c),
                    Module::Data(c) => ('d', c),
                };
                clr.select(ch, ch.to_ascii_uppercase())
            }));
            res.push('\n');
        }
        res
    }

    fn index(&self, r: i16, c: i16) -> usize {
        let w = self.w as i16;
        debug_assert!((-w..w).contains(&r), "Row {r} outside width {w}");
        debug_assert!((-w..w).contains(&c), "Column {c} outside width {w}");

        r.rem_euclid(w) as usize * self.w + c.rem_euclid(w) as usize
    }

    pub fn get(&self, r: i16, c: i16) -> Module {
        self.grid[self.index(r, c)]
    }

    pub(crate) fn get_mut(&mut self, r: i16, c: i16) -> &mut Module {
        let idx = self.index(r, c);
        &mut self.grid[idx]
    }

    pub(crate) fn set(&mut self, r: i16, c: i16, module: Module) {
        *self.get_mut(r, c) = module;
    }
}


// Finder pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_finder_patterns(&mut self) {
        let far = self.w as i16 - 4;
        for (r, c) in [(3, 3), (3, far), (far, 3)] {
            self.draw_finder_pattern_at(r, c);
        }
    }

    // Rings around the centre by chebyshev distance: stone 0..=1, light 2, dark 3, separator 4.
    // The separator is clipped at the symbol edge.
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.w as i16;
        for dr in -4..=4i16 {
            for dc in -4..=4i16 {
                let (mr, mc) = (r + dr, c + dc);
                if !(0..w).contains(&mr) || !(0..w).contains(&mc) {
                    continue;
                }
                let ring = dr.abs().max(dc.abs());
                self.set(mr, mc, Module::Func(Color::from(ring != 2 && ring != 4)));
            }
        }
    }
}


// Timing pattern
//------------------------------------------------------------------------------

impl QR {
    // Row 6 and column 6 between the separators, dark on even indices
    fn draw_timing_pattern(&mut self) {
        for i in 8..self.w as i16 - 8 {
            let m = Module::Func(Color::from(i % 2 == 0));
            self.set(6, i, m);
            self.set(i, 6, m);
        }
    }
}


// Alignment pattern
//------------------------------------------------------------------------------

impl QR {
    // Every pair of listed centres gets a pattern, except the three corners under a finder
    fn draw_alignment_patterns(&mut self) {
        let centres = self.ver.alignment_pattern();
        let far = self.w as i16 - 7;
        for &r in &centres {
            for &c in &centres {
                if (r == 6 && (c == 6 || c == far)) || (r == far && c == 6) {
                    continue;
                }
                for dr in -2..=2i16 {
                    for dc in -2..=2i16 {
                        let ring = dr.abs().max(dc.abs());
                        self.set(r + dr, c + dc, Module::Func(Color::from(ring != 1)));
                    }
                }
            }
        }
    }
}

// All function patterns
//------------------------------------------------------------------------------

impl QR {
    pub(crate) fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_pattern();
        self.draw_alignment_patterns();
    }
}


// Format & version info
//------------------------------------------------------------------------------

impl QR {
    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, format_info: u32) {
        let (off, on) = (Module::Format(Color::Light), Module::Format(Color::Dark));
        self.draw_number(format_info, off, on, &FORMAT_INFO_COORDS_MAIN);
        self.draw_number(format_info, off, on, &FORMAT_INFO_COORDS_SIDE);
        self.set(DARK_MODULE.0, DARK_MODULE.1, on);
    }

    fn draw_version_info(&mut self) {
        if *self.ver < 7 {
            return;
        }
        let ver_info = self.ver.info();
        let (off, on) = (Module::Version(Color::Light), Module::Version(Color::Dark));
        self.draw_number(ver_info, off, on, &VERSION_INFO_COORDS_BL);
        self.draw_number(ver_info, off, on, &VERSION_INFO_COORDS_TR);
    }

    // Bit i of number goes to coords[i]
    fn draw_number(&mut self, number: u32, off_clr: Module, on_clr: Module, coords: &[(i16, i16)]) {
        for (i, &(r, c)) in coords.iter().enumerate() {
            let m = if (number >> i) & 1 == 1 { on_clr } else { off_clr };
            self.set(r, c, m);
        }
    }
}


// Encoding region
//------------------------------------------------------------------------------

impl QR {
    /// Places interleaved codewords in the empty modules. Remainder modules stay light.
    pub(crate) fn draw_encoding_region(&mut self, payload: BitStream) {
        self.reserve_format_area();
        self.draw_version_info();
        self.draw_payload(payload);

        debug_assert!(!self.grid.contains(&Module::Empty), "Empty module found after payload");
    }

    fn draw_payload(&mut self, mut payload: BitStream) {
        for (r, c) in EncRegionIter::new(self.ver) {
            if matches!(self.get(r, c), Module::Empty) {
                let bit = payload.next().unwrap_or(false);
                self.set(r, c, Module::Data(Color::from(bit)));
            }
        }
        debug_assert!(payload.next().is_none(), "Payload exceeds encoding region");
    }

    /// Flips data modules under the mask and writes matching format info
    pub(crate) fn apply_mask(&mut self, pattern: MaskPattern) {
        let mask_fn = pattern.mask_functions();
        let w = self.w;
        for (i, m) in self.grid.iter_mut().enumerate() {
            if let Module::Data(clr) = m {
                if mask_fn((i / w) as i16, (i % w) as i16) {
                    *clr = !*clr;
                }
            }
        }
        self.mask = Some(pattern);
        self.draw_format_info(format_info(self.ecl, pattern));
    }
}


// Render
//------------------------------------------------------------------------------

impl QR {
    /// Projects the matrix to an image with `margin` light modules of quiet zone on each side
    pub fn render(&self, fg: Rgb<u8>, bg: Rgb<u8>, module_sz: u32, margin: u32) -> RgbImage {
        debug_assert!(module_sz > 0, "Module size must be non zero");

        let side = (self.w as u32 + 2 * margin) * module_sz;
        let (sz, margin) = (module_sz as usize, margin as usize);
        RgbImage::from_fn(side, side, |x, y| {
            if self.dark_at(x as usize, y as usize, sz, margin) {
                fg
            } else {
                bg
            }
        })
    }

    /// Black on white with the standard 4 module quiet zone
    pub fn to_image(&self, module_sz: u32) -> RgbImage {
        self.render(Rgb([0, 0, 0]), Rgb([255, 255, 255]), module_sz, 4)
    }

    /// Block character art, `module_sz` characters per module, with a quiet zone of 4 modules
    pub fn to_str(&self, module_sz: usize) -> String {
        let side = (self.w + 8) * module_sz;
        let mut canvas = String::with_capacity(side * (side + 1) * 3);
        for y in 0..side {
            canvas.extend((0..side).map(|x| if self.dark_at(x, y, module_sz, 4) { ' ' } else { '█' }));
            canvas.push('\n');
        }
        canvas
    }

    // Whether pixel (x, y) of a render at this scale falls on a dark module
    fn dark_at(&self, x: usize, y: usize, module_sz: usize, margin: usize) -> bool {
        let r = (y / module_sz).checked_sub(margin);
        let c = (x / module_sz).checked_sub(margin);
        match (r, c) {
            (Some(r), Some(c)) if r < self.w && c < self.w => self.is_dark(r, c),
            _ => false,
        }
    }
}
