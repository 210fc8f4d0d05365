use super::geometry::Point;

/// Horizontal span of pixels visited by a flood fill, both ends inclusive
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Row {
    pub left: u32,
    pub right: u32,
    pub y: u32,
}

impl Row {
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }
}

// Sink for the spans of a flood fill
//------------------------------------------------------------------------------

pub trait Accumulator {
    fn accumulate(&mut self, row: Row);
}

// Pixel count and centre of mass of a region
//------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Centroid {
    pub area: u32,
    // Sum of 2x over all pixels, keeping half-pixel span midpoints integral
    moment_2x: u64,
    moment_y: u64,
}

impl Centroid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rounded centre of mass, or the origin for an empty region
    pub fn centre(&self) -> Point {
        if self.area == 0 {
            return Point::default();
        }
        let area = self.area as f64;
        let x = self.moment_2x as f64 / (2.0 * area);
        let y = self.moment_y as f64 / area;
        Point { x: x.round() as i32, y: y.round() as i32 }
    }
}

impl Accumulator for Centroid {
    fn accumulate(&mut self, row: Row) {
        let w = row.width();
        self.area += w;
        self.moment_2x += (row.left + row.right) as u64 * w as u64;
        self.moment_y += row.y as u64 * w as u64;
    }
}
