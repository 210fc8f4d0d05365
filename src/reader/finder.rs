use log::trace;

use crate::common::metadata::{Color, Version};

use super::{
    binarize::BinaryImage,
    utils::{
        geometry::{Point, Slope, Y},
        verify_pattern,
    },
};

// Finder line
//------------------------------------------------------------------------------

// **   ******   **  <- Finder line
// ^    ^        ^
// left |        right
//      stone
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct DatumLine {
    left: u32,
    stone: u32,
    right: u32,
    y: u32,
}

// Line scanner to detect finder line
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct LineScanner {
    buffer: [u32; 6],    // Run length of each transition
    prev: Option<Color>, // Last observed color
    flips: u32,          // Count of color changes
    pos: u32,            // Current position
    y: u32,
}

impl LineScanner {
    pub fn new() -> Self {
        Self { buffer: [0; 6], prev: None, flips: 0, pos: 0, y: 0 }
    }

    pub fn reset(&mut self, y: u32) {
        self.buffer[5] = 0;
        self.prev = None;
        self.flips = 0;
        self.pos = 0;
        self.y = y;
    }

    pub fn advance(&mut self, color: Color) -> Option<DatumLine> {
        self.pos += 1;

        if self.prev == Some(color) {
            self.buffer[5] += 1;
            return None;
        }

        self.buffer.rotate_left(1);
        self.buffer[5] = 1;
        self.prev = Some(color);
        self.flips += 1;

        // The run that just closed must be dark
        if color == Color::Light && self.is_finder_line() {
            Some(DatumLine {
                left: self.pos - 1 - self.buffer[..5].iter().sum::<u32>(),
                stone: self.pos - 1 - self.buffer[2..5].iter().sum::<u32>(),
                right: self.pos - 1 - self.buffer[4],
                y: self.y,
            })
        } else {
            None
        }
    }

    // Validates whether last 5 run lengths are in the 1:1:3:1:1 ratio
    fn is_finder_line(&self) -> bool {
        if self.flips < 6 {
            return false;
        }

        let avg = (self.buffer[..5].iter().sum::<u32>() as f64) / 7.0;
        let tol = avg * 3.0 / 4.0;

        FINDER_PATTERN.iter().zip(self.buffer.iter()).all(|(r, &rl)| {
            let rl = rl as f64;
            rl >= r * avg - tol && rl <= r * avg + tol
        })
    }
}

const FINDER_PATTERN: [f64; 5] = [1.0, 1.0, 3.0, 1.0, 1.0];

// Finder
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finder {
    pub centre: Point,
    pub module_size: f64,
}

// Locate finders
//------------------------------------------------------------------------------

/// Scans every row for 1:1:3:1:1 runs and returns the finders that survive verification, in
/// scan order.
pub fn locate_finders(img: &mut BinaryImage) -> Vec<Finder> {
    let mut finders = Vec::new();
    let (w, h) = (img.w, img.h);
    let mut scanner = LineScanner::new();

    for y in 0..h {
        for x in 0..w {
            let Some(px) = img.get(x, y) else {
                continue;
            };
            let Some(datum) = scanner.advance(Color::from(px)) else {
                continue;
            };

            if let Some(finder) = verify_and_mark_finder(img, &datum) {
                finders.push(finder);
            }
        }

        // Closes the last run when a finder touches the right edge of the image
        if let Some(datum) = scanner.advance(Color::Light) {
            if let Some(finder) = verify_and_mark_finder(img, &datum) {
                finders.push(finder);
            }
        }

        scanner.reset(y + 1);
    }

    trace!("Located {} finder(s)", finders.len());
    finders
}

// Checks multiple conditions to ensure the finder is valid
// 1. The stone wasn't already claimed by another finder
// 2. Crosscheck 1:1:3:1:1 pattern along Y axis
// 3. Left and right datum points are connected through the ring
// 4. Ring and stone regions aren't connected
// 5. Area of stone region is roughly 37.5% of ring region
// Finally it marks both regions as finder and returns the centre of the stone
fn verify_and_mark_finder(img: &mut BinaryImage, datum: &DatumLine) -> Option<Finder> {
    let DatumLine { left: l, stone: s, right: r, y } = *datum;

    let stone = img.get_region((s, y))?;
    if stone.is_finder {
        return None;
    }

    let sx = r - (s - l) * 5 / 4;
    let seed = Point { x: sx as i32, y: y as i32 };
    let max_run = (r - l) * 2;
    if !verify_pattern::<Y>(img, &seed, &FINDER_PATTERN, max_run) {
        return None;
    }

    let ring = img.get_region((r, y))?;
    if img.get(l, y) != img.get(r, y) || ring.id == stone.id {
        return None;
    }

    let ratio = stone.area * 100 / ring.area.max(1);
    if ratio <= 10 || 70 <= ratio {
        return None;
    }

    img.mark_finder(ring.id);
    img.mark_finder(stone.id);

    // Stone covers 9 modules and the ring 24
    let module_size = ((stone.area + ring.area) as f64 / 33.0).sqrt();
    Some(Finder { centre: stone.centre, module_size })
}

// Groups finders in 3, which form potential symbols
//------------------------------------------------------------------------------

// Cosine of the widest deviation from a right angle at the top left finder
const MAX_CORNER_COS: f64 = 0.35;

// Largest ratio between the two legs of the right angle
const MAX_LEG_RATIO: f64 = 1.6;

// Largest ratio between module sizes of the finders in a group
const MAX_MODULE_RATIO: f64 = 2.0;

// Caps the cubic grouping search on noisy images
const MAX_GROUPED_FINDERS: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct FinderGroup {
    pub finders: [Finder; 3], // [BL, TL, TR]
    pub score: f64,           // Deviation from an ideal square, lower is better
}

impl FinderGroup {
    pub fn bl(&self) -> &Finder {
        &self.finders[0]
    }

    pub fn tl(&self) -> &Finder {
        &self.finders[1]
    }

    pub fn tr(&self) -> &Finder {
        &self.finders[2]
    }

    pub fn module_size(&self) -> f64 {
        self.finders.iter().map(|f| f.module_size).sum::<f64>() / 3.0
    }

    /// Provisional version from the spacing of the finders. Finder centres sit `width - 7`
    /// modules apart.
    pub fn estimate_version(&self) -> Version {
        let ms = self.module_size();
        let h = self.tl().centre.dist(&self.tr().centre);
        let v = self.tl().centre.dist(&self.bl().centre);
        let size = (h + v) / 2.0 / ms + 7.0;
        let ver = ((size - 17.0) / 4.0).round().clamp(1.0, 40.0) as usize;
        Version::new(ver).unwrap_or(Version::MIN)
    }
}

/// Returns every plausible symbol formed by three finders, best first.
pub fn group_finders(finders: &[Finder]) -> Vec<FinderGroup> {
    let finders = &finders[..finders.len().min(MAX_GROUPED_FINDERS)];
    let mut groups = Vec::new();

    for (i, a) in finders.iter().enumerate() {
        for (j, b) in finders.iter().enumerate().skip(i + 1) {
            for c in finders.iter().skip(j + 1) {
                let best = [(a, b, c), (b, a, c), (c, a, b)]
                    .into_iter()
                    .filter_map(|(corner, p, q)| try_corner(corner, p, q))
                    .min_by(|x, y| x.score.total_cmp(&y.score));
                if let Some(group) = best {
                    groups.push(group);
                }
            }
        }
    }

    groups.sort_by(|x, y| x.score.total_cmp(&y.score));
    trace!("Formed {} finder group(s)", groups.len());
    groups
}

// Scores `corner` as the top left finder of a symbol with `p` and `q` as the other two
fn try_corner(corner: &Finder, p: &Finder, q: &Finder) -> Option<FinderGroup> {
    let u = Slope::new(&corner.centre, &p.centre);
    let v = Slope::new(&corner.centre, &q.centre);
    let (lu, lv) = (u.len(), v.len());

    let sizes = [corner.module_size, p.module_size, q.module_size];
    let max_ms = sizes.iter().cloned().fold(f64::MIN, f64::max);
    let min_ms = sizes.iter().cloned().fold(f64::MAX, f64::min);
    if min_ms <= 0.0 {
        return None;
    }
    let ms_ratio = max_ms / min_ms;

    // Centres of a version 1 symbol sit 14 modules apart
    let ms = sizes.iter().sum::<f64>() / 3.0;
    if lu < ms * 10.0 || lv < ms * 10.0 {
        return None;
    }

    let cos = u.dot(&v) as f64 / (lu * lv);
    let leg_ratio = lu.max(lv) / lu.min(lv);
    if cos.abs() > MAX_CORNER_COS || leg_ratio > MAX_LEG_RATIO || ms_ratio > MAX_MODULE_RATIO {
        return None;
    }

    // With y pointing down, TR lies clockwise from BL around TL
    let (tr, bl) = if u.cross(&v) > 0 { (p, q) } else { (q, p) };
    let score = cos.abs() + (leg_ratio - 1.0) + (ms_ratio - 1.0);

    Some(FinderGroup { finders: [*bl, *corner, *tr], score })
}

#[cfg(test)]
mod finder_tests {
    use image::imageops;

    use super::{group_finders, locate_finders, Finder, LineScanner};
    use crate::builder::QRBuilder;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{Color, ECLevel, Version};
    use crate::reader::{binarize::BinaryImage, utils::geometry::Point};

    fn finder(x: i32, y: i32) -> Finder {
        Finder { centre: Point { x, y }, module_size: 10.0 }
    }

    #[test]
    fn test_line_scanner() {
        let mut scn = LineScanner::new();
        let runs = [
            (Color::Light, 3),
            (Color::Dark, 2),
            (Color::Light, 2),
            (Color::Dark, 6),
            (Color::Light, 2),
            (Color::Dark, 2),
        ];
        let mut found = None;
        for (color, len) in runs.iter() {
            for _ in 0..*len {
                found = found.or(scn.advance(*color));
            }
        }
        assert_eq!(found, None);

        let datum = scn.advance(Color::Light).expect("Finder line not detected");
        assert_eq!((datum.left, datum.stone, datum.right), (3, 7, 15));
    }

    #[test]
    fn test_locate_finder() {
        let data = "Hello, world!🌎";
        let qr = QRBuilder::new(data.as_bytes())
            .version(Version::new(4).unwrap())
            .ec_level(ECLevel::L)
            .mask(MaskPattern::new(1))
            .build()
            .unwrap();
        let img = qr.to_image(10);

        let mut bin_img = BinaryImage::prepare(&img).unwrap();
        let finders = locate_finders(&mut bin_img);

        let centres = [(75, 75), (335, 75), (75, 335)];
        for (x, y) in centres {
            let f = finders.iter().find(|f| f.centre == Point { x, y });
            let f = f.unwrap_or_else(|| panic!("No finder at ({x}, {y}): {finders:?}"));
            assert!((f.module_size - 10.0).abs() < 0.5, "Module size {}", f.module_size);
        }
    }

    #[test]
    fn test_group_finders() {
        let finders = [finder(75, 75), finder(335, 75), finder(75, 335), finder(600, 600)];
        let groups = group_finders(&finders);
        let best = &groups[0];
        assert_eq!(best.tl().centre, Point { x: 75, y: 75 });
        assert_eq!(best.tr().centre, Point { x: 335, y: 75 });
        assert_eq!(best.bl().centre, Point { x: 75, y: 335 });
        assert_eq!(best.estimate_version(), Version::new(4).unwrap());
    }

    #[test]
    fn test_group_finders_rotated() {
        // Symbol turned by 180 degrees
        let finders = [finder(335, 335), finder(75, 335), finder(335, 75)];
        let groups = group_finders(&finders);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tl().centre, Point { x: 335, y: 335 });
        assert_eq!(groups[0].tr().centre, Point { x: 75, y: 335 });
        assert_eq!(groups[0].bl().centre, Point { x: 335, y: 75 });
    }

    #[test]
    fn test_group_rejects_skewed() {
        let finders = [finder(75, 75), finder(335, 75), finder(500, 200)];
        assert!(group_finders(&finders).is_empty());
    }

    #[test]
    fn test_locate_and_group_rotated_image() {
        let qr = QRBuilder::new(b"rotation").version(Version::new(2).unwrap()).build().unwrap();
        let img = imageops::rotate90(&qr.to_image(5));

        let mut bin_img = BinaryImage::prepare(&img).unwrap();
        let finders = locate_finders(&mut bin_img);
        let groups = group_finders(&finders);
        let best = &groups[0];

        // Top left corner of the symbol ends up at the top right of the image
        let w = img.width() as i32;
        let tl = best.tl().centre;
        assert!((tl.x - (w - 1 - 37)).abs() <= 1 && (tl.y - 37).abs() <= 1, "{tl:?}");
        assert_eq!(best.estimate_version(), Version::new(2).unwrap());
    }
}
