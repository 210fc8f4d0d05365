// Point
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn dist_sq(&self, other: &Point) -> u64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        (dx * dx + dy * dy) as u64
    }

    pub fn dist(&self, other: &Point) -> f64 {
        (self.dist_sq(other) as f64).sqrt()
    }
}

// Slope
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Slope {
    pub dx: i32,
    pub dy: i32,
}

impl Slope {
    pub fn new(from: &Point, to: &Point) -> Self {
        Self { dx: to.x - from.x, dy: to.y - from.y }
    }

    pub fn dot(&self, other: &Slope) -> i64 {
        self.dx as i64 * other.dx as i64 + self.dy as i64 * other.dy as i64
    }

    pub fn cross(&self, other: &Slope) -> i64 {
        self.dx as i64 * other.dy as i64 - self.dy as i64 * other.dx as i64
    }

    pub fn len(&self) -> f64 {
        (self.dot(self) as f64).sqrt()
    }
}

// Axis to walk along while scanning patterns
//------------------------------------------------------------------------------

pub trait Axis {
    fn shift(pt: &mut Point, d: i32);
}

pub struct X;
impl Axis for X {
    fn shift(pt: &mut Point, d: i32) {
        pt.x += d;
    }
}

pub struct Y;
impl Axis for Y {
    fn shift(pt: &mut Point, d: i32) {
        pt.y += d;
    }
}
