use std::collections::VecDeque;

use image::GenericImageView;
use image::Pixel as ImgPixel;

use crate::common::error::{DecodeError, DecodeResult};
use crate::common::metadata::Color;

use super::utils::{
    accumulate::{Accumulator, Centroid, Row},
    geometry::Point,
};

// Images below this contrast (max - min luma) carry nothing worth scanning
pub const MIN_CONTRAST: u8 = 24;

// Smallest image that can hold a version 1 symbol at one pixel per module
pub const MIN_IMAGE_SIZE: u32 = 21;

const BLOCK_SIZE: u32 = 8;

// Pixel
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Pixel {
    Visited(u32, Color), // Contains id of associated region
    Unvisited(Color),
}

impl From<Pixel> for Color {
    fn from(p: Pixel) -> Self {
        match p {
            Pixel::Visited(_, c) | Pixel::Unvisited(c) => c,
        }
    }
}

// Region
//------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Region {
    pub id: u32,
    pub src: (u32, u32),
    pub color: Color,
    pub area: u32,
    pub centre: Point,
    pub is_finder: bool,
}

// Adaptive thresholding
// 1. Converts the image to luma and divides it into blocks of 8x8 pixels
// 2. Averages each block. Flat blocks (max - min <= 24) are assumed light unless their top and
//    left neighbours are darker
// 3. Thresholds each block by the mean of the 5x5 block averages around it, clipped at the edges
// 4. Marks a pixel dark if its luma is less than or equal to its block threshold
//------------------------------------------------------------------------------

fn to_luma<I>(img: &I) -> Vec<u8>
where
    I: GenericImageView,
    I::Pixel: ImgPixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    let mut luma = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            luma.push(img.get_pixel(x, y).to_luma()[0]);
        }
    }
    luma
}

fn block_average(luma: &[u8], w: u32, h: u32) -> Vec<u32> {
    let wsteps = w.div_ceil(BLOCK_SIZE) as usize;
    let hsteps = h.div_ceil(BLOCK_SIZE) as usize;
    let len = wsteps * hsteps;

    let mut sum = vec![0u32; len];
    let mut count = vec![0u32; len];
    let mut min_max = vec![(u8::MAX, 0u8); len];

    for y in 0..h {
        let row_off = (y / BLOCK_SIZE) as usize * wsteps;
        for x in 0..w {
            let p = luma[(y * w + x) as usize];
            let i = row_off + (x / BLOCK_SIZE) as usize;
            sum[i] += p as u32;
            count[i] += 1;
            min_max[i].0 = min_max[i].0.min(p);
            min_max[i].1 = min_max[i].1.max(p);
        }
    }

    let mut avg = vec![0u32; len];
    for i in 0..len {
        let (mn, mx) = min_max[i];
        if mx - mn <= MIN_CONTRAST {
            avg[i] = mn as u32 / 2;
            let (bx, by) = (i % wsteps, i / wsteps);
            if bx > 0 && by > 0 {
                // Average of neighbours (x-1, y), (x, y-1), (x-1, y-1)
                let ng_avg = (2 * avg[i - 1] + avg[i - wsteps] + avg[i - wsteps - 1]) / 4;
                if (mn as u32) < ng_avg {
                    avg[i] = ng_avg;
                }
            }
        } else {
            avg[i] = sum[i] / count[i];
        }
    }
    avg
}

fn block_threshold(avg: &[u32], w: u32, h: u32) -> Vec<u8> {
    let wsteps = w.div_ceil(BLOCK_SIZE) as usize;
    let hsteps = h.div_ceil(BLOCK_SIZE) as usize;

    let mut res = vec![0u8; wsteps * hsteps];
    for y in 0..hsteps {
        let (y0, y1) = (y.saturating_sub(2), (y + 2).min(hsteps - 1));
        for x in 0..wsteps {
            let (x0, x1) = (x.saturating_sub(2), (x + 2).min(wsteps - 1));
            let mut sum = 0u32;
            for ny in y0..=y1 {
                let off = ny * wsteps;
                sum += avg[off + x0..=off + x1].iter().sum::<u32>();
            }
            let n = ((y1 - y0 + 1) * (x1 - x0 + 1)) as u32;
            res[y * wsteps + x] = (sum / n) as u8;
        }
    }
    res
}

// Image type for reader
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BinaryImage {
    buffer: Vec<Pixel>,
    regions: Vec<Region>, // Index is region id
    pub w: u32,
    pub h: u32,
}

impl BinaryImage {
    /// Binarizes any 8-bit image with an adaptive block threshold. Fails with
    /// `LowQualityImage` when the image is too small or too flat to hold a symbol.
    pub fn prepare<I>(img: &I) -> DecodeResult<Self>
    where
        I: GenericImageView,
        I::Pixel: ImgPixel<Subpixel = u8>,
    {
        let (w, h) = img.dimensions();
        if w < MIN_IMAGE_SIZE || h < MIN_IMAGE_SIZE {
            return Err(DecodeError::LowQualityImage);
        }

        let luma = to_luma(img);
        let (mn, mx) = luma.iter().fold((u8::MAX, 0u8), |(mn, mx), &p| (mn.min(p), mx.max(p)));
        if mx - mn < MIN_CONTRAST {
            return Err(DecodeError::LowQualityImage);
        }

        let avg = block_average(&luma, w, h);
        let thresh = block_threshold(&avg, w, h);
        let wsteps = w.div_ceil(BLOCK_SIZE);

        let mut buffer = Vec::with_capacity(luma.len());
        for y in 0..h {
            let thresh_row_off = (y / BLOCK_SIZE) * wsteps;
            for x in 0..w {
                let p = luma[(y * w + x) as usize];
                let t = thresh[(thresh_row_off + x / BLOCK_SIZE) as usize];
                buffer.push(Pixel::Unvisited(Color::from(p <= t)));
            }
        }

        Ok(Self { buffer, regions: Vec::new(), w, h })
    }

    /// Swaps dark and light, for symbols printed light on dark. Forgets all regions.
    pub fn invert(&mut self) {
        for px in self.buffer.iter_mut() {
            *px = Pixel::Unvisited(!Color::from(*px));
        }
        self.regions.clear();
    }

    fn coord_to_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.w as i32 || y >= self.h as i32 {
            return None;
        }
        Some((y as u32 * self.w + x as u32) as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.buffer[(y * self.w + x) as usize])
    }

    pub fn get_at_point(&self, pt: &Point) -> Option<Pixel> {
        let idx = self.coord_to_index(pt.x, pt.y)?;
        Some(self.buffer[idx])
    }

    /// Color under a point. Anything outside the image counts as light.
    pub fn color_at(&self, pt: &Point) -> Color {
        self.get_at_point(pt).map_or(Color::Light, Color::from)
    }

    fn set(&mut self, x: u32, y: u32, px: Pixel) {
        if x < self.w && y < self.h {
            self.buffer[(y * self.w + x) as usize] = px;
        }
    }

    /// Returns the connected region containing `src`, filling it on first visit.
    pub fn get_region(&mut self, src: (u32, u32)) -> Option<Region> {
        match self.get(src.0, src.1)? {
            Pixel::Unvisited(color) => {
                let id = self.regions.len() as u32;
                let to = Pixel::Visited(id, color);
                let acc = self.fill_and_accumulate(src, to, Centroid::new());
                let reg = Region {
                    id,
                    src,
                    color,
                    area: acc.area,
                    centre: acc.centre(),
                    is_finder: false,
                };
                self.regions.push(reg);
                Some(reg)
            }
            Pixel::Visited(id, _) => self.regions.get(id as usize).copied(),
        }
    }

    pub fn mark_finder(&mut self, id: u32) {
        if let Some(reg) = self.regions.get_mut(id as usize) {
            reg.is_finder = true;
        }
    }

    /// Scanline flood fill over 4-connected pixels equal to the pixel at `src`
    pub fn fill_and_accumulate<A: Accumulator>(
        &mut self,
        src: (u32, u32),
        target: Pixel,
        mut acc: A,
    ) -> A {
        let Some(from) = self.get(src.0, src.1) else {
            return acc;
        };
        if from == target {
            return acc;
        }

        let w = self.w;
        let h = self.h;
        let mut queue = VecDeque::new();
        queue.push_back(src);

        while let Some((x, y)) = queue.pop_front() {
            // Already reached through another segment
            if self.get(x, y) != Some(from) {
                continue;
            }

            let mut left = x;
            let mut right = x;
            self.set(x, y, target);

            while left > 0 && self.get(left - 1, y) == Some(from) {
                left -= 1;
                self.set(left, y, target);
            }

            while right < w - 1 && self.get(right + 1, y) == Some(from) {
                right += 1;
                self.set(right, y, target);
            }

            acc.accumulate(Row { left, right, y });

            for ny in [y.wrapping_sub(1), y + 1] {
                if ny >= h {
                    continue;
                }
                let mut seg_len = 0;
                for x in left..=right {
                    if self.get(x, ny) == Some(from) {
                        seg_len += 1;
                    } else if seg_len > 0 {
                        queue.push_back((x - 1, ny));
                        seg_len = 0;
                    }
                }
                if seg_len > 0 {
                    queue.push_back((right, ny));
                }
            }
        }
        acc
    }
}
