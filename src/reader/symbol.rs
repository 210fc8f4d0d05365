use std::collections::HashSet;

use log::trace;

use super::{
    binarize::BinaryImage,
    finder::FinderGroup,
    utils::{
        geometry::{Point, X, Y},
        homography::Homography,
        verify_pattern,
    },
};
use crate::builder::{Module, QR};
use crate::common::{
    bit_utils::BitStream,
    ec::rectify_info,
    error::{DecodeError, DecodeResult},
    iter::EncRegionIter,
    mask::MaskPattern,
    metadata::{
        parse_format_info, valid_format_infos, valid_version_infos, Color, ECLevel, Version,
        FORMAT_ERROR_CAPACITY, FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE, FORMAT_MASK,
        VERSION_ERROR_BIT_LEN, VERSION_ERROR_CAPACITY, VERSION_INFO_COORDS_BL,
        VERSION_INFO_COORDS_TR,
    },
};

// Locates symbol from 3 finder centres and a provisional version
//------------------------------------------------------------------------------

const ALIGN_PATTERN: [f64; 3] = [1.0, 1.0, 1.0];

// Region centres are pixel indices, the projection works on continuous coordinates
fn anchor(p: Point) -> (f64, f64) {
    (p.x as f64 + 0.5, p.y as f64 + 0.5)
}

/// Homography built from the finder centres alone, treating the symbol as a parallelogram. Good
/// enough to read the areas next to the finders.
pub fn finder_homography(group: &FinderGroup, ver: Version) -> Option<Homography> {
    let w = ver.width() as f64;
    let (bl, tl, tr) = (group.bl().centre, group.tl().centre, group.tr().centre);
    let br = Point { x: tr.x + bl.x - tl.x, y: tr.y + bl.y - tl.y };

    let src = [(3.5, 3.5), (w - 3.5, 3.5), (w - 3.5, w - 3.5), (3.5, w - 3.5)];
    let dst = [tl, tr, br, bl].map(anchor);
    Homography::compute(src, dst)
}

/// Maps the symbol grid onto the image. Versions above 1 anchor the fourth corner on the bottom
/// right alignment pattern, then the projection is refined against all function patterns.
pub fn locate_symbol(
    img: &mut BinaryImage,
    group: &FinderGroup,
    ver: Version,
) -> Option<Homography> {
    let rough = finder_homography(group, ver)?;
    if *ver == 1 {
        return Some(refine_homography(img, rough, ver));
    }

    let w = ver.width() as f64;
    let a = w - 6.5;
    let seed = rough.map(a, a)?;

    let h = match locate_alignment_pattern(img, seed, group.module_size()) {
        Some(align) => {
            trace!("Alignment pattern at {align:?}, predicted {seed:?}");
            let (bl, tl, tr) = (group.bl().centre, group.tl().centre, group.tr().centre);
            let src = [(3.5, 3.5), (w - 3.5, 3.5), (a, a), (3.5, w - 3.5)];
            let dst = [tl, tr, align, bl].map(anchor);
            Homography::compute(src, dst).unwrap_or(rough)
        }
        None => {
            trace!("No alignment pattern near {seed:?}");
            rough
        }
    };

    Some(refine_homography(img, h, ver))
}

// Spirals out of the predicted centre looking for a small dark stone enclosed by a light ring
fn locate_alignment_pattern(img: &mut BinaryImage, seed: Point, module_size: f64) -> Option<Point> {
    let mod_area = module_size * module_size;
    let radius = (module_size * 4.0).ceil() as i32;
    let max_run = (module_size * 2.0).ceil() as u32 + 1;
    let mut seen = HashSet::new();

    for r in 0..=radius {
        for pt in square_ring(seed, r) {
            if img.color_at(&pt) != Color::Dark {
                continue;
            }
            let Some(stone) = img.get_region((pt.x as u32, pt.y as u32)) else {
                continue;
            };
            if !seen.insert(stone.id) {
                continue;
            }

            let area = stone.area as f64;
            if stone.is_finder || area < mod_area * 0.25 || area > mod_area * 3.0 {
                continue;
            }

            let c = stone.centre;
            if !verify_pattern::<X>(img, &c, &ALIGN_PATTERN, max_run)
                || !verify_pattern::<Y>(img, &c, &ALIGN_PATTERN, max_run)
            {
                continue;
            }

            // Light ring of 8 modules must enclose the stone
            let beside = Point { x: c.x + module_size.round() as i32, y: c.y };
            if img.color_at(&beside) != Color::Light {
                continue;
            }
            let Some(ring) = img.get_region((beside.x as u32, beside.y as u32)) else {
                continue;
            };
            let ring_area = ring.area as f64;
            if ring_area < mod_area * 3.0 || ring_area > mod_area * 16.0 {
                continue;
            }

            return Some(c);
        }
    }
    None
}

fn square_ring(c: Point, r: i32) -> Vec<Point> {
    if r == 0 {
        return vec![c];
    }
    let mut pts = Vec::with_capacity(8 * r as usize);
    for d in -r..=r {
        pts.push(Point { x: c.x + d, y: c.y - r });
        pts.push(Point { x: c.x + d, y: c.y + r });
    }
    for d in -r + 1..r {
        pts.push(Point { x: c.x - r, y: c.y + d });
        pts.push(Point { x: c.x + r, y: c.y + d });
    }
    pts
}

// Ring signs around a pattern centre, innermost first. Positive rings should be dark.
const FINDER_RINGS: [i32; 4] = [1, 1, -1, 1];
const ALIGNMENT_RINGS: [i32; 3] = [1, -1, 1];

// Hill-climbs one coefficient at a time, keeping each nudge that raises the fitness. Steps start
// at 2% of the coefficient and halve every round.
fn refine_homography(img: &BinaryImage, mut h: Homography, ver: Version) -> Homography {
    let mut best = symbol_fitness(img, &h, ver);
    let mut steps = h.0.map(|x| x * 0.02);

    for _ in 0..5 {
        for j in 0..8 {
            for dir in [-1.0, 1.0] {
                let old = h[j];
                h[j] += dir * steps[j];
                let fit = symbol_fitness(img, &h, ver);
                if fit > best {
                    best = fit;
                } else {
                    h[j] = old;
                }
            }
        }
        steps.iter_mut().for_each(|s| *s *= 0.5);
    }
    trace!("Symbol fitness after refinement: {best}");
    h
}

// Agreement between the projected grid and the timing lines, finders and alignment patterns
fn symbol_fitness(img: &BinaryImage, h: &Homography, ver: Version) -> i32 {
    let w = ver.width() as i32;
    let far = w - 7;

    let timing: i32 = (7..far)
        .map(|i| {
            let sign = if i % 2 == 0 { 1 } else { -1 };
            sign * (cell_fitness(img, h, i, 6) + cell_fitness(img, h, 6, i))
        })
        .sum();

    let finders: i32 = [(3, 3), (w - 4, 3), (3, w - 4)]
        .into_iter()
        .map(|(x, y)| pattern_fitness(img, h, x, y, &FINDER_RINGS))
        .sum();

    let centres = ver.alignment_pattern();
    let alignments: i32 = centres
        .iter()
        .flat_map(|&r| centres.iter().map(move |&c| (r as i32, c as i32)))
        .filter(|&(r, c)| !((r == 6 && (c == 6 || c == far)) || (r == far && c == 6)))
        .map(|(r, c)| pattern_fitness(img, h, c, r, &ALIGNMENT_RINGS))
        .sum();

    timing + finders + alignments
}

fn pattern_fitness(img: &BinaryImage, h: &Homography, cx: i32, cy: i32, rings: &[i32]) -> i32 {
    rings.iter().zip(0..).map(|(sign, r)| sign * ring_fitness(img, h, cx, cy, r)).sum()
}

// Cells at chebyshev distance `r` from the centre
fn ring_fitness(img: &BinaryImage, h: &Homography, cx: i32, cy: i32, r: i32) -> i32 {
    if r == 0 {
        return cell_fitness(img, h, cx, cy);
    }
    let cell = |x, y| cell_fitness(img, h, x, y);
    (0..2 * r)
        .map(|i| {
            cell(cx - r + i, cy - r)
                + cell(cx + r, cy - r + i)
                + cell(cx + r - i, cy + r)
                + cell(cx - r, cy + r - i)
        })
        .sum()
}

// +1 for every dark sample in the module, -1 for every light one, on a 3x3 lattice
fn cell_fitness(img: &BinaryImage, h: &Homography, x: i32, y: i32) -> i32 {
    const SAMPLES: [f64; 3] = [0.3, 0.5, 0.7];
    SAMPLES
        .iter()
        .flat_map(|&dy| SAMPLES.iter().map(move |&dx| (x as f64 + dx, y as f64 + dy)))
        .filter_map(|(gx, gy)| project(h, gx, gy))
        .filter_map(|pt| img.get_at_point(&pt))
        .map(|px| Color::from(px).select(1, -1))
        .sum()
}

// Pixel containing the projection of a grid point
fn project(h: &Homography, x: f64, y: f64) -> Option<Point> {
    let (px, py) = h.map_f(x, y)?;
    let range = i32::MIN as f64..=i32::MAX as f64;
    if !range.contains(&px) || !range.contains(&py) {
        return None;
    }
    Some(Point { x: px.floor() as i32, y: py.floor() as i32 })
}

// Symbol
//------------------------------------------------------------------------------

/// A located symbol: the binarized image plus the projection of its module grid.
#[derive(Debug)]
pub struct Symbol<'a> {
    img: &'a BinaryImage,
    h: Homography,
    pub ver: Version,
}

impl<'a> Symbol<'a> {
    pub fn new(img: &'a BinaryImage, h: Homography, ver: Version) -> Self {
        Self { img, h, ver }
    }

    /// Samples the centre of a module. Negative indices wrap from the far edge.
    pub fn is_dark(&self, r: i16, c: i16) -> bool {
        let w = self.ver.width() as i16;
        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        match project(&self.h, c as f64 + 0.5, r as f64 + 0.5) {
            Some(pt) => self.img.color_at(&pt) == Color::Dark,
            None => false,
        }
    }

    // Reads modules as bits, least significant first
    fn read_number(&self, coords: &[(i16, i16)]) -> u32 {
        coords
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &(r, c))| acc | (self.is_dark(r, c) as u32) << i)
    }

    // Reads both copies of an info area and keeps the one closest to a valid number
    fn read_info(&self, copies: [&[(i16, i16)]; 2], valid: &[u32], err_cap: u32) -> Option<u32> {
        copies
            .iter()
            .filter_map(|coords| {
                let raw = self.read_number(coords);
                rectify_info(raw, valid, err_cap).map(|v| ((v ^ raw).count_ones(), v))
            })
            .min_by_key(|(dist, _)| *dist)
            .map(|(_, v)| v)
    }
}

// Format & version info
//------------------------------------------------------------------------------

impl Symbol<'_> {
    pub fn read_format_info(&self) -> DecodeResult<(ECLevel, MaskPattern)> {
        let copies = [&FORMAT_INFO_COORDS_MAIN[..], &FORMAT_INFO_COORDS_SIDE[..]];
        let info = self
            .read_info(copies, &valid_format_infos(), FORMAT_ERROR_CAPACITY)
            .ok_or(DecodeError::FormatInfoCorrupt)?;
        Ok(parse_format_info(info ^ FORMAT_MASK))
    }

    pub fn read_version_info(&self) -> Option<Version> {
        let copies = [&VERSION_INFO_COORDS_BL[..], &VERSION_INFO_COORDS_TR[..]];
        let info = self.read_info(copies, &valid_version_infos(), VERSION_ERROR_CAPACITY)?;
        Version::new(info as usize >> VERSION_ERROR_BIT_LEN)
    }
}

// Payload extraction
//------------------------------------------------------------------------------

impl Symbol<'_> {
    /// Reads the codeword bits in placement order with the mask removed. Remainder bits are
    /// dropped.
    pub fn extract_payload(&self, mask: MaskPattern) -> BitStream {
        let template = QR::function_template(self.ver);
        let mask_fn = mask.mask_functions();
        let total = self.ver.total_codewords() << 3;
        let mut payload = BitStream::new(total);

        for (r, c) in EncRegionIter::new(self.ver) {
            if payload.len() == total {
                break;
            }
            if template.get(r, c) != Module::Empty {
                continue;
            }
            payload.push(self.is_dark(r, c) != mask_fn(r, c));
        }
        payload
    }
}

#[cfg(test)]
mod symbol_tests {
    use super::{locate_symbol, Symbol};
    use crate::builder::{Module, QRBuilder, QR};
    use crate::common::codec::encode_with_version;
    use crate::common::error::DecodeError;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{
        Color, ECLevel, Version, FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE,
        VERSION_INFO_COORDS_BL, VERSION_INFO_COORDS_TR,
    };
    use crate::reader::{
        binarize::BinaryImage,
        finder::{group_finders, locate_finders},
    };

    fn build(ver: usize, ecl: ECLevel, mask: u8) -> QR {
        QRBuilder::new("Hello, world! 🌎".as_bytes())
            .version(Version::new(ver).unwrap())
            .ec_level(ecl)
            .mask(MaskPattern::new(mask))
            .build()
            .unwrap()
    }

    // Locates the symbol in a rendering of `qr` and hands it to `check`
    fn with_symbol<F: FnOnce(&Symbol)>(qr: &QR, module_sz: u32, check: F) {
        let img = qr.to_image(module_sz);
        let mut img = BinaryImage::prepare(&img).unwrap();
        let finders = locate_finders(&mut img);
        let groups = group_finders(&finders);
        let group = groups.first().expect("No finder group");
        let ver = group.estimate_version();
        assert_eq!(ver, qr.version());
        let h = locate_symbol(&mut img, group, ver).expect("Symbol not found");
        check(&Symbol::new(&img, h, ver));
    }

    fn set_all(qr: &mut QR, coords: &[(i16, i16)], module: Module) {
        for &(r, c) in coords {
            qr.set(r, c, module);
        }
    }

    #[test]
    fn test_sample_modules() {
        let qr = build(2, ECLevel::L, 1);
        with_symbol(&qr, 3, |sym| {
            let w = qr.width();
            for r in 0..w {
                for c in 0..w {
                    assert_eq!(sym.is_dark(r as i16, c as i16), qr.is_dark(r, c), "({r}, {c})");
                }
            }
        });
    }

    #[test]
    fn test_read_format_info_clean() {
        let qr = build(2, ECLevel::L, 1);
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_format_info(), Ok((ECLevel::L, MaskPattern::new(1))));
        });
    }

    #[test]
    fn test_read_format_info_one_corrupted() {
        let mut qr = build(2, ECLevel::Q, 5);
        for &(r, c) in FORMAT_INFO_COORDS_MAIN[..3].iter() {
            let flipped = !*qr.get(r, c);
            qr.set(r, c, Module::Format(flipped));
        }
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_format_info(), Ok((ECLevel::Q, MaskPattern::new(5))));
        });
    }

    #[test]
    fn test_read_format_info_one_fully_corrupted() {
        let mut qr = build(3, ECLevel::H, 3);
        set_all(&mut qr, &FORMAT_INFO_COORDS_MAIN, Module::Format(Color::Light));
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_format_info(), Ok((ECLevel::H, MaskPattern::new(3))));
        });
    }

    #[test]
    fn test_read_format_info_both_fully_corrupted() {
        // All light is at least 5 bits away from every format info
        let mut qr = build(2, ECLevel::L, 1);
        set_all(&mut qr, &FORMAT_INFO_COORDS_MAIN, Module::Format(Color::Light));
        set_all(&mut qr, &FORMAT_INFO_COORDS_SIDE, Module::Format(Color::Light));
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_format_info(), Err(DecodeError::FormatInfoCorrupt));
        });
    }

    #[test]
    fn test_read_version_info() {
        let qr = build(7, ECLevel::L, 2);
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_version_info(), Version::new(7));
        });
    }

    #[test]
    fn test_read_version_info_one_fully_corrupted() {
        let mut qr = build(7, ECLevel::M, 2);
        set_all(&mut qr, &VERSION_INFO_COORDS_BL, Module::Version(Color::Dark));
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_version_info(), Version::new(7));
        });
    }

    #[test]
    fn test_read_version_info_both_fully_corrupted() {
        let mut qr = build(7, ECLevel::M, 2);
        set_all(&mut qr, &VERSION_INFO_COORDS_BL, Module::Version(Color::Light));
        set_all(&mut qr, &VERSION_INFO_COORDS_TR, Module::Version(Color::Light));
        with_symbol(&qr, 3, |sym| {
            assert_eq!(sym.read_version_info(), None);
        });
    }

    #[test]
    fn test_extract_payload() {
        let qr = build(3, ECLevel::M, 6);
        let ver = qr.version();
        with_symbol(&qr, 4, |sym| {
            let payload = sym.extract_payload(MaskPattern::new(6));
            assert_eq!(payload.len(), ver.total_codewords() * 8);

            let encoded = encode_with_version("Hello, world! 🌎".as_bytes(), ver, ECLevel::M);
            let blocks = QRBuilder::blockify(encoded.unwrap().data(), ver, ECLevel::M);
            let data = blocks.iter().map(|b| b.data()).collect::<Vec<_>>();
            let ecc = blocks.iter().map(|b| b.ecc()).collect::<Vec<_>>();
            let mut expected = QRBuilder::interleave(&data);
            expected.extend(QRBuilder::interleave(&ecc));
            assert_eq!(payload.data(), expected);
        });
    }
}
